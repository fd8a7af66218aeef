#![allow(clippy::unwrap_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;

use super::*;

#[test]
fn every_code_is_documented() {
    for code in ErrorCode::ALL {
        assert!(ErrorDocs::has_docs(*code), "{code} has no documentation");
    }
    assert_eq!(ErrorDocs::all_codes().count(), ErrorCode::ALL.len());
}

#[test]
fn docs_start_with_their_code() {
    for code in ErrorDocs::all_codes() {
        let doc = ErrorDocs::get(code).unwrap();
        assert!(
            doc.starts_with(&format!("# {}: ", code.as_str())),
            "{code} doc has the wrong title"
        );
    }
}

#[test]
fn this_capture_doc_names_the_fix() {
    let doc = ErrorDocs::get(ErrorCode::E1010).unwrap();
    assert!(doc.contains("Implicitly Captures `this`"));
    assert!(doc.contains("## Solution"));
}
