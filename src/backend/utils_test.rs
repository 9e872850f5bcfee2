use super::*;

#[test]
fn test_clean_response() {
    assert_eq!(clean_response("Hello there!"), "Hello there!");
    assert_eq!(
        clean_response("<think>\nthe user says hi\n</think>\n\nHello!"),
        "Hello!"
    );
    assert_eq!(
        clean_response("<thinking>plan</thinking>Answer <think>x</think>here"),
        "Answer here"
    );
    assert_eq!(clean_response("one\n\n\n\n  \ntwo"), "one\n\ntwo");
    assert_eq!(clean_response("keep\n\nparagraphs  \nintact"), "keep\n\nparagraphs\nintact");
    assert_eq!(clean_response("  <think>only thoughts</think>  "), "");
}

#[test]
fn test_clean_response_keeps_unclosed_tags() {
    assert_eq!(clean_response("<think>never closed"), "<think>never closed");
}
