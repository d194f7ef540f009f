use std::fs;

use campus_cli::{load_documents, load_events, load_faqs};
use tempfile::TempDir;

#[test]
fn loads_text_files_and_csv_tables() {
    let dir = TempDir::new().expect("tmp");
    fs::create_dir_all(dir.path().join("notices")).expect("mkdir");
    fs::write(dir.path().join("notices").join("notice_2025_03_15.txt"), "Library closed on March 15th.").expect("txt");
    fs::write(dir.path().join("policy_wifi.txt"), "Campus Wi-Fi uses your student ID.").expect("txt");
    fs::write(dir.path().join("readme.md"), "ignored").expect("md");
    fs::write(
        dir.path().join("faqs.csv"),
        "question,answer,category\nWhen does the library open?,At 8am.,library\n\"Where is parking, exactly?\",Lot B.,\n",
    )
    .expect("faqs");
    fs::write(dir.path().join("events.csv"), "title,description,location\nCareer Fair,Meet employers,Hall A\n")
        .expect("events");

    let docs = load_documents(dir.path()).expect("load");
    let ids: Vec<&str> = docs.iter().map(|d| d.source_id.as_str()).collect();
    assert_eq!(ids, vec!["notice_2025_03_15", "policy_wifi", "faq_1", "faq_2", "event_1"]);
    assert_eq!(docs[2].text, "FAQ: When does the library open? Answer: At 8am.");
    assert_eq!(docs[3].text, "FAQ: Where is parking, exactly? Answer: Lot B.");
    assert_eq!(docs[4].text, "Event: Career Fair Description: Meet employers");
}

#[test]
fn events_without_descriptions_are_kept() {
    let dir = TempDir::new().expect("tmp");
    let path = dir.path().join("events.csv");
    fs::write(&path, "title\nOrientation\n").expect("events");
    let docs = load_events(&path).expect("load");
    assert_eq!(docs[0].text, "Event: Orientation Description: ");
    assert_eq!(docs[0].source_id, "event_1");
}

#[test]
fn faq_rows_missing_columns_are_errors() {
    let dir = TempDir::new().expect("tmp");
    let path = dir.path().join("faqs.csv");
    fs::write(&path, "question\nWhat?\n").expect("faqs");
    assert!(load_faqs(&path).is_err());
}

#[test]
fn missing_directory_is_an_error() {
    let dir = TempDir::new().expect("tmp");
    assert!(load_documents(&dir.path().join("nope")).is_err());
}
