use pretty_assertions::assert_eq;

use super::*;

#[test]
fn builder_collects_context() {
    let diag = Diagnostic::error(ErrorCode::E1001)
        .with_message("'int &' cannot be used as the type of a kernel parameter")
        .with_label(Span::new(10, 14), "captured here")
        .with_secondary_label(Span::new(0, 4), "kernel declared here")
        .with_note("references are not copyable to the device");

    assert!(diag.is_error());
    assert_eq!(diag.primary_span(), Some(Span::new(10, 14)));
    assert_eq!(diag.related, vec![Label::new(Span::new(0, 4), "kernel declared here")]);
}

#[test]
fn display_renders_all_parts() {
    let diag = Diagnostic::warning(ErrorCode::W1001)
        .with_message("size of kernel arguments (4096 bytes) may exceed the supported maximum of 2048 bytes")
        .with_label(Span::new(2, 5), "kernel here")
        .with_suggestion("pass large data through a buffer")
        .in_kernel("_ZTS4Name");

    assert_eq!(
        diag.to_string(),
        "warning[W1001]: size of kernel arguments (4096 bytes) may exceed the supported maximum of 2048 bytes\n  --> 2..5: kernel here\n  = kernel: _ZTS4Name\n  = help: pass large data through a buffer"
    );
}

#[test]
fn second_primary_label_demotes_the_first() {
    let diag = Diagnostic::error(ErrorCode::E3001)
        .with_secondary_label(Span::new(0, 1), "first")
        .with_label(Span::new(5, 9), "declared here")
        .with_label(Span::new(20, 24), "conflict");

    assert_eq!(diag.primary_span(), Some(Span::new(20, 24)));
    let related: Vec<&str> = diag.related.iter().map(|l| l.message.as_str()).collect();
    assert_eq!(related, vec!["declared here", "first"]);
}

#[test]
fn kernel_context_is_set_once() {
    let diag = Diagnostic::new(ErrorCode::E1010)
        .in_kernel("_ZTS5Inner")
        .in_kernel("_ZTS5Outer");
    assert_eq!(diag.kernel.as_deref(), Some("_ZTS5Inner"));
}

#[test]
fn severity_follows_the_code() {
    assert_eq!(Diagnostic::new(ErrorCode::W1002).severity, Severity::Warning);
    assert_eq!(Diagnostic::new(ErrorCode::E2001).severity, Severity::Error);
    assert!(Diagnostic::new(ErrorCode::E9001).primary.is_none());
}
