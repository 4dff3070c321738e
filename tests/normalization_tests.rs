//! Property tests for subject/sender extraction and the fallback summary

mod common;

use common::create_headers;
use gmail_triage::classifier::{fallback_summary, has_all_sections, interpret_response};
use gmail_triage::models::{EmailRecord, MessageHeader, DEFAULT_SENDER, DEFAULT_SUBJECT};
use proptest::prelude::*;

/// Randomly re-case every character of a header name
fn recase(name: &str, mask: &[bool]) -> String {
    name.chars()
        .zip(mask.iter().cycle())
        .map(|(c, upper)| {
            if *upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect()
}

proptest! {
    #[test]
    fn header_names_are_case_insensitive(
        subject in "[A-Za-z0-9 !?.-]{1,40}",
        sender in "[a-z]{1,10}@[a-z]{1,10}\\.com",
        mask in prop::collection::vec(any::<bool>(), 1..8),
    ) {
        let canonical = EmailRecord::from_headers(&create_headers(&subject, &sender));
        let recased = EmailRecord::from_headers(&[
            MessageHeader::new(recase("Subject", &mask), subject.clone()),
            MessageHeader::new(recase("From", &mask), sender.clone()),
        ]);

        prop_assert_eq!(&canonical, &recased);
        prop_assert_eq!(recased.subject(), subject.as_str());
        prop_assert_eq!(recased.sender(), sender.as_str());
    }

    #[test]
    fn missing_headers_get_defaults(
        other_names in prop::collection::vec("X-[A-Za-z]{1,10}", 0..5),
    ) {
        let headers: Vec<MessageHeader> = other_names
            .iter()
            .map(|name| MessageHeader::new(name.as_str(), "value"))
            .collect();
        let record = EmailRecord::from_headers(&headers);

        prop_assert_eq!(record.subject(), DEFAULT_SUBJECT);
        prop_assert_eq!(record.sender(), DEFAULT_SENDER);
    }

    #[test]
    fn fallback_preserves_batch_order(
        subjects in prop::collection::vec("[A-Za-z]{1,12}", 1..20),
    ) {
        let records: Vec<EmailRecord> = subjects
            .iter()
            .map(|subject| EmailRecord::new(subject.as_str(), "sender@example.com"))
            .collect();

        let result = interpret_response("", &records);
        prop_assert_eq!(&result.text, &fallback_summary(&records));
        prop_assert!(!has_all_sections(&result.text));

        let listed: Vec<&str> = result
            .text
            .lines()
            .filter_map(|line| line.strip_prefix("• "))
            .map(|line| line.split(" - From: ").next().unwrap_or_default())
            .collect();
        let expected: Vec<&str> = subjects.iter().map(String::as_str).collect();
        prop_assert_eq!(listed, expected);
    }
}

#[test]
fn test_blank_header_values_use_defaults() {
    let record = EmailRecord::from_headers(&create_headers("", ""));
    assert_eq!(record.subject(), "No Subject");
    assert_eq!(record.sender(), "Unknown Sender");
}
