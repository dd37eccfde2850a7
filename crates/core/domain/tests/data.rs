use domain::{CloudPayload, MetricValue, SeverityLevel, TypedValue, WireField, WireRecord};

#[test]
fn payload_keeps_insertion_order_and_overwrites_in_place() {
    let mut payload = CloudPayload::new();
    payload.add_metric("b", MetricValue::Integer(1));
    payload.add_metric("a", MetricValue::Boolean(true));
    payload.add_metric("b", MetricValue::Integer(2));

    let names: Vec<&str> = payload.metric_names().collect();
    assert_eq!(names, vec!["b", "a"]);
    assert_eq!(payload.metric("b"), Some(&MetricValue::Integer(2)));
}

#[test]
fn payload_rejects_empty_metric_name() {
    let mut payload = CloudPayload::new();
    assert!(!payload.add_metric("", MetricValue::Null));
    assert!(payload.is_empty());
}

#[test]
fn record_duplicate_field_keeps_first_position() {
    let record = WireRecord::new(vec![
        WireField::new("x", TypedValue::Integer(1), SeverityLevel::Info),
        WireField::new("y", TypedValue::from("y"), SeverityLevel::Info),
        WireField::new("x", TypedValue::Integer(3), SeverityLevel::Info),
    ]);

    assert_eq!(record.len(), 2);
    assert_eq!(record.fields()[0].name, "x");
    assert_eq!(record.fields()[0].value, TypedValue::Integer(3));
    assert_eq!(record.severity(), SeverityLevel::Info);
}

#[test]
fn typed_value_reports_its_tag() {
    assert_eq!(TypedValue::from(7i16).data_type().as_str(), "SHORT");
    assert_eq!(TypedValue::from(vec![1u8, 2]).as_bytes(), Some(&[1u8, 2][..]));
    assert_eq!(TypedValue::empty_string().as_str(), Some(""));
    assert_eq!(MetricValue::String("ERROR".to_string()).to_string(), "ERROR");
}
