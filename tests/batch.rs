use std::fs;
use std::path::Path;

use sheetschema::batch::{self, BatchOptions, Format, IR_FILE};
use sheetschema::pipeline::GenerateOptions;

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[test]
fn tabular_tree_is_mirrored_and_failures_are_isolated() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    write(
        &input.path().join("hr/staff.csv"),
        "employee_table\nname,null_allowed,type,maxLength\nid,No,number,\nlabel,Yes,string,40\n\naddress_list\nname,type\nstreet,string\n",
    );
    write(
        &input.path().join("finance.json"),
        r#"{"name": "finance", "sheets": [{"name": "ledger", "rows": [["entry_table"], ["name", "type"], ["amount", "number"]]}]}"#,
    );
    write(&input.path().join("broken.json"), r#"{"sheets": [{"name": 3}]}"#);

    let report = batch::run(Format::Tabular, input.path(), output.path(), &BatchOptions::default()).unwrap();

    assert_eq!(report.generated.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].input.ends_with("broken.json"));
    assert!(!report.is_clean());

    let staff = output.path().join("hr/staff");
    for file in [
        "mod.rs",
        "runtime.rs",
        "workbook.rs",
        "sheets/staff/sheet.rs",
        "sheets/staff/employee-table.rs",
        "sheets/staff/address-list.rs",
        "registry/table.rs",
    ] {
        assert!(staff.join(file).is_file(), "missing {file}");
    }
    let table = fs::read_to_string(staff.join("sheets/staff/employee-table.rs")).unwrap();
    assert!(table.contains(r#"pub const HEADER: [&str; 2] = ["id", "label"];"#));
    let list = fs::read_to_string(staff.join("sheets/staff/address-list.rs")).unwrap();
    assert!(list.contains("pub fn add_street(&mut self, value: Value)"));

    assert!(output.path().join("finance/sheets/ledger/entry-table.rs").is_file());
    assert!(!output.path().join("broken").exists());
}

#[test]
fn inferred_runs_can_emit_their_ir() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let doc = r#"{"payload": {"name": "book", "sheets": [
        {"name": "a", "blocks": [{"name": "kv_list", "items": [{"k": 1}]}]},
        {"name": "b", "blocks": [{"name": "kv_list", "items": [{"k": 2}]}]}
    ]}}"#;
    let file = input.path().join("sample.json");
    write(&file, doc);

    let options = BatchOptions {
        generate: GenerateOptions {
            dedup: true,
            ..GenerateOptions::default()
        },
        emit_ir: true,
        json_pointer: Some("/payload".into()),
        ..BatchOptions::default()
    };
    let report = batch::run(Format::Infer, &file, output.path(), &options).unwrap();
    assert!(report.is_clean(), "{:?}", report.failed);

    let out = output.path().join("sample");
    let ir: serde_json::Value = serde_json::from_str(&fs::read_to_string(out.join(IR_FILE)).unwrap()).unwrap();
    let definitions = ir["definitions"].as_object().unwrap();
    assert_eq!(definitions.len(), 1);
    let name = definitions.keys().next().unwrap();
    assert!(name.starts_with("kv_list_"), "inferred definitions carry a hash suffix: {name}");

    let shared_file = format!("shared/{}.rs", name.replace('_', "-"));
    assert!(out.join(shared_file).is_file());
}
