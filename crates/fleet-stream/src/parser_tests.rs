use super::*;

#[test]
fn parses_a_single_line_object() {
    let parser = JsonStreamParser::new();
    let value = parser.parse_next(r#"{"a":1}"#).unwrap();
    assert_eq!(value["a"], 1);
}

#[test]
fn assembles_a_multiline_object_across_calls() {
    let parser = JsonStreamParser::new();
    assert!(parser.parse_next("{").is_none());
    assert!(parser.parse_next(r#"  "a": 1,"#).is_none());
    assert!(parser.parse_next(r#"  "b": [1, 2,"#).is_none());
    assert!(parser.parse_next("  3]").is_none());
    let value = parser.parse_next("}").unwrap();
    assert_eq!(value["a"], 1);
    assert_eq!(value["b"][2], 3);
}

#[test]
fn non_json_lines_are_ignored() {
    let parser = JsonStreamParser::new();
    assert!(parser.parse_next("hello there").is_none());
    assert_eq!(parser.error_count(), 0);
    let value = parser.parse_next(r#"{"ok":true}"#).unwrap();
    assert_eq!(value["ok"], true);
}

#[test]
fn malformed_object_resets_and_counts_an_error() {
    let parser = JsonStreamParser::new();
    let _ = parser.parse_next("{");
    assert!(parser.parse_next("not json}").is_none());
    assert_eq!(parser.error_count(), 1);
    // parser recovered cleanly and can parse the next well-formed object
    let value = parser.parse_next(r#"{"ok":true}"#).unwrap();
    assert_eq!(value["ok"], true);
}

#[test]
fn oversized_line_is_rejected_and_recovers() {
    let parser = JsonStreamParser::with_max_line_size(8);
    assert!(parser.parse_next(r#"{"a":"way too long a value"}"#).is_none());
    assert_eq!(parser.error_count(), 1);
    let value = parser.parse_next(r#"{"ok":1}"#).unwrap();
    assert_eq!(value["ok"], 1);
}

#[tokio::test]
async fn push_mode_forwards_completed_values() {
    let parser = std::sync::Arc::new(JsonStreamParser::new());
    let (tx, rx) = tokio::sync::mpsc::channel(4);
    let mut values = parser.spawn_push(rx);

    tx.send(r#"{"n":1}"#.to_string()).await.unwrap();
    tx.send(r#"{"n":2}"#.to_string()).await.unwrap();
    drop(tx);

    assert_eq!(values.recv().await.unwrap()["n"], 1);
    assert_eq!(values.recv().await.unwrap()["n"], 2);
    assert!(values.recv().await.is_none());
}
