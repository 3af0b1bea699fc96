//! Tests for log call construction and source rewriting

use super::*;

fn pending(functions: &[&str]) -> PendingFunctions {
    functions
        .iter()
        .map(|n| FunctionDescriptor::new(*n, vec![]))
        .collect()
}

fn style(unformatted: UnformattedPolicy) -> LogStyle {
    LogStyle {
        unformatted,
        ..LogStyle::default()
    }
}

const FRAME_SOURCE: &str = concat!(
    "#include \"obs-frame.h\"\n",
    "#include <stdlib.h>\n",
    "\n",
    "void obs_frame_init(obs_frame_t *frame, int width)\n",
    "{\n",
    "    frame->w = width;\n",
    "}\n",
);

#[test]
fn test_end_to_end_frame_init() {
    let mut pending = pending(&["obs_frame_init"]);
    let edit = instrument_source(FRAME_SOURCE, &mut pending, &LogStyle::default());

    let lines: Vec<&str> = edit.content.lines().collect();
    let brace = lines.iter().position(|l| l.trim() == "{").unwrap();
    assert_eq!(
        lines[brace + 1].trim(),
        r#"blog(LOG_DEBUG, "obs_frame_init called with params: frame: %p, width: %d", frame, width);"#
    );
    assert_eq!(lines[brace + 1], format!("    {}", lines[brace + 1].trim()));
    assert!(pending.is_empty());
    assert_eq!(edit.instrumented.len(), 1);
    assert_eq!(edit.instrumented[0].line, 5);
}

#[test]
fn test_include_inserted_before_last_include() {
    let mut pending = pending(&["obs_frame_init"]);
    let edit = instrument_source(FRAME_SOURCE, &mut pending, &LogStyle::default());

    let lines: Vec<&str> = edit.content.lines().collect();
    assert!(edit.include_added);
    assert_eq!(lines[0], "#include \"obs-frame.h\"");
    assert_eq!(lines[1], "#include <util/base.h>");
    assert_eq!(lines[2], "#include <stdlib.h>");
}

#[test]
fn test_include_at_top_when_none_present() {
    let source = "int obs_get(void)\n{\n\treturn 1;\n}";
    let mut pending = pending(&["obs_get"]);
    let edit = instrument_source(source, &mut pending, &LogStyle::default());
    assert_eq!(
        edit.content,
        "#include <util/base.h>\nint obs_get(void)\n{\n\tblog(LOG_DEBUG, \"obs_get called\");\n\treturn 1;\n}"
    );
}

#[test]
fn test_untouched_file_is_unchanged() {
    let mut pending = pending(&["obs_other"]);
    let edit = instrument_source(FRAME_SOURCE, &mut pending, &LogStyle::default());
    assert!(!edit.changed());
    assert!(!edit.include_added);
    assert_eq!(edit.content, FRAME_SOURCE);
    assert_eq!(pending.len(), 1);
}

#[test]
fn test_second_run_is_a_no_op() {
    let mut first = pending(&["obs_frame_init"]);
    let once = instrument_source(FRAME_SOURCE, &mut first, &LogStyle::default());

    let mut second = pending(&["obs_frame_init"]);
    let twice = instrument_source(&once.content, &mut second, &LogStyle::default());

    assert!(!twice.changed());
    assert_eq!(twice.already_instrumented, vec!["obs_frame_init".to_string()]);
    assert_eq!(twice.content, once.content);
    assert!(second.is_empty(), "already instrumented functions are not leftover");
}

#[test]
fn test_same_line_brace_and_trailing_statement() {
    let source = "int obs_twice(int v) { return v * 2;\n}";
    let mut pending = pending(&["obs_twice"]);
    let edit = instrument_source(source, &mut pending, &LogStyle::default());
    let lines: Vec<&str> = edit.content.lines().collect();
    assert_eq!(lines[1], "int obs_twice(int v) {");
    assert_eq!(
        lines[2],
        "    blog(LOG_DEBUG, \"obs_twice called with params: v: %d\", v);"
    );
    assert_eq!(lines[3], "    return v * 2;");
}

#[test]
fn test_crlf_line_endings_preserved() {
    let source = "#include <a.h>\r\nvoid obs_a(int x)\r\n{\r\n\tx++;\r\n}\r\n";
    let mut pending = pending(&["obs_a"]);
    let edit = instrument_source(source, &mut pending, &LogStyle::default());
    assert_eq!(
        edit.content,
        "#include <util/base.h>\r\n#include <a.h>\r\nvoid obs_a(int x)\r\n{\r\n\tblog(LOG_DEBUG, \"obs_a called with params: x: %d\", x);\r\n\tx++;\r\n}\r\n"
    );
}

#[test]
fn test_at_most_once_per_run() {
    let mut pending = pending(&["obs_a"]);
    let first = instrument_source("void obs_a(void)\n{\n}", &mut pending, &LogStyle::default());
    let second = instrument_source("void obs_a(void)\n{\n}", &mut pending, &LogStyle::default());
    assert!(first.changed());
    assert!(!second.changed());
}

#[test]
fn test_unformatted_policies() {
    let function = FunctionDescriptor::new(
        "obs_set",
        vec![
            ParameterDescriptor::new("pos", "struct vec2", false),
            ParameterDescriptor::new("count", "int", false),
        ],
    );

    let skip = build_log_call(&function, &style(UnformattedPolicy::Skip));
    assert_eq!(
        skip.statement,
        r#"blog(LOG_DEBUG, "obs_set called with params: count: %d", count);"#
    );
    assert_eq!(skip.unformatted, vec!["pos".to_string()]);

    let address = build_log_call(&function, &style(UnformattedPolicy::Address));
    assert_eq!(
        address.statement,
        r#"blog(LOG_DEBUG, "obs_set called with params: pos: %p, count: %d", (void *)&pos, count);"#
    );

    let annotate = build_log_call(&function, &style(UnformattedPolicy::Annotate));
    assert_eq!(
        annotate.statement,
        r#"blog(LOG_DEBUG, "obs_set called with params: pos: no formatter for this, count: %d", count);"#
    );
    assert_eq!(annotate.unformatted, vec!["pos".to_string()]);
}

#[test]
fn test_argument_count_matches_specifiers() {
    let function = FunctionDescriptor::new(
        "f",
        vec![
            ParameterDescriptor::new("name", "const char", true),
            ParameterDescriptor::new("size", "size_t", false),
            ParameterDescriptor::new("color", "float [4]", true),
            ParameterDescriptor::new("c", "char", false),
            ParameterDescriptor::new("big", "long long", false),
        ],
    );
    for policy in [
        UnformattedPolicy::Skip,
        UnformattedPolicy::Address,
        UnformattedPolicy::Annotate,
    ] {
        let call = build_log_call(&function, &style(policy));
        let (format, args) = call.statement.rsplit_once('"').unwrap();
        assert_eq!(
            format.matches('%').count(),
            args.matches(',').count(),
            "{}",
            call.statement
        );
    }
}

#[test]
fn test_specifier_for_pointers_and_chars() {
    assert_eq!(
        specifier_for(&ParameterDescriptor::new("s", "const char", true)),
        Some("%s")
    );
    assert_eq!(
        specifier_for(&ParameterDescriptor::new("c", "char", false)),
        Some("%c")
    );
    assert_eq!(
        specifier_for(&ParameterDescriptor::new("n", "int", true)),
        Some("%p")
    );
    assert_eq!(
        specifier_for(&ParameterDescriptor::new("s", "struct foo", true)),
        Some("%p")
    );
    assert_eq!(
        specifier_for(&ParameterDescriptor::new("v", "struct foo", false)),
        None
    );
}

#[test]
fn test_pointers_never_use_value_specifiers() {
    let function = FunctionDescriptor::new(
        "obs_a",
        vec![
            ParameterDescriptor::new("count", "int", true),
            ParameterDescriptor::new("c", "char", false),
            ParameterDescriptor::new("color", "float", true),
            ParameterDescriptor::new("name", "const char", true),
            ParameterDescriptor::new("scale", "float", false),
        ],
    );
    let call = build_log_call(&function, &LogStyle::default());
    assert_eq!(
        call.statement,
        "blog(LOG_DEBUG, \"obs_a called with params: count: %p, c: %c, color: %p, name: %s, scale: %f\", count, c, color, name, scale);"
    );
    assert!(call.unformatted.is_empty());
}

#[test]
fn test_reparsed_pointer_and_array_params_print_as_addresses() {
    let source = "void obs_a(int *count, char c, float color[4])\n{\n}\n";
    let mut pending = pending(&["obs_a"]);
    let edit = instrument_source(source, &mut pending, &LogStyle::default());
    assert!(edit.content.contains(
        "\"obs_a called with params: count: %p, c: %c, color: %p\", count, c, color);"
    ));
}

#[test]
fn test_paired_mode_inserts_called_line() {
    let source = "void obs_a(int x)\n{\n\tx++;\n}\n\nvoid obs_b(void) {\n\treturn;\n}\n";
    let exported = vec![
        FunctionDescriptor::new("obs_b", vec![]),
        FunctionDescriptor::new("obs_a", vec![]),
        FunctionDescriptor::new("obs_missing", vec![]),
    ];
    let mut pending: PendingFunctions = exported.iter().cloned().collect();
    let edit = instrument_paired(source, &exported, &mut pending, &LogStyle::default());

    assert_eq!(
        edit.content,
        "void obs_a(int x)\n{\n\tblog(LOG_DEBUG, \"obs_a called\");\n\tx++;\n}\n\nvoid obs_b(void) {\n\tblog(LOG_DEBUG, \"obs_b called\");\n\treturn;\n}\n"
    );
    assert!(!edit.include_added);
    assert_eq!(pending.into_leftovers(), vec!["obs_missing".to_string()]);

    let lines: Vec<usize> = edit.instrumented.iter().map(|f| f.line).collect();
    assert_eq!(lines, vec![6, 2]);
}

#[test]
fn test_paired_mode_ignores_calls_and_prototypes() {
    let source = "void obs_a(int x);\n\nstatic void helper(void)\n{\n\tif (obs_a(1)) {\n\t}\n}\n\nvoid obs_a(int x)\n{\n}\n";
    let exported = vec![FunctionDescriptor::new("obs_a", vec![])];
    let mut pending: PendingFunctions = exported.iter().cloned().collect();
    let edit = instrument_paired(source, &exported, &mut pending, &LogStyle::default());

    let lines: Vec<&str> = edit.content.lines().collect();
    assert_eq!(lines[9], "{");
    assert_eq!(lines[10], "    blog(LOG_DEBUG, \"obs_a called\");");
    assert_eq!(edit.instrumented[0].line, 10);
}

#[test]
fn test_paired_mode_skips_already_instrumented() {
    let source = "void obs_a(void)\n{\n\tblog(LOG_DEBUG, \"obs_a called\");\n}\n";
    let exported = vec![FunctionDescriptor::new("obs_a", vec![])];
    let mut pending: PendingFunctions = exported.iter().cloned().collect();
    let edit = instrument_paired(source, &exported, &mut pending, &LogStyle::default());
    assert!(!edit.changed());
    assert_eq!(edit.content, source);
    assert_eq!(edit.already_instrumented, vec!["obs_a".to_string()]);
    assert!(pending.is_empty());
}
