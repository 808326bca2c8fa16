use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_sholatd");
    let mut child = Command::new(exe)
        .env_remove("SHOLATD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn sholatd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(value["ok"], true, "{} failed: {}", method, value);
    value["result"].clone()
}

fn error_code(v: &serde_json::Value) -> Option<&str> {
    v.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|c| c.as_str())
}

#[test]
fn resubmitting_a_day_updates_the_same_report() {
    let workspace = temp_dir("sholat-submit");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let student_id = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "name": "Fatimah", "gender": "P" }),
    )["studentId"]
        .as_str()
        .expect("studentId")
        .to_string();

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "reports.submit",
        json!({
            "studentId": student_id,
            "date": "2025-01-06",
            "prayers": { "subuh": true, "dzuhur": true }
        }),
    );
    assert_eq!(first["created"], true);
    assert_eq!(first["report"]["completed"], 2);
    assert_eq!(first["report"]["ashar"], false);

    let second = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "reports.submit",
        json!({
            "studentId": student_id,
            "date": "2025-01-06",
            "prayers": {
                "subuh": true, "dzuhur": true, "ashar": true, "maghrib": true, "isya": true
            }
        }),
    );
    assert_eq!(second["created"], false);
    assert_eq!(second["report"]["id"], first["report"]["id"]);
    assert_eq!(second["report"]["completed"], 5);

    let listed = request_ok(&mut stdin, &mut reader, "5", "reports.list", json!({}));
    assert_eq!(listed["totalRows"], 1);

    let today = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "reports.today",
        json!({ "studentId": student_id, "date": "2025-01-06" }),
    );
    assert_eq!(today["submitted"], true);
    assert_eq!(today["report"]["isya"], true);

    let other_day = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "reports.today",
        json!({ "studentId": student_id, "date": "2025-01-05" }),
    );
    assert_eq!(other_day["submitted"], false);
    assert!(other_day["report"].is_null());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn history_lists_each_day_newest_first_with_gaps() {
    let workspace = temp_dir("sholat-history");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let student_id = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "name": "Umar", "gender": "L" }),
    )["studentId"]
        .as_str()
        .expect("studentId")
        .to_string();

    for (i, date) in ["2025-01-06", "2025-01-04", "2024-12-20"].iter().enumerate() {
        request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{}", i),
            "reports.submit",
            json!({ "studentId": student_id, "date": date, "prayers": { "maghrib": true } }),
        );
    }

    let history = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "reports.history",
        json!({ "studentId": student_id, "today": "2025-01-06" }),
    );
    let days = history["days"].as_array().expect("days");
    assert_eq!(days.len(), 7);
    assert_eq!(days[0]["date"], "2025-01-06");
    assert_eq!(days[0]["report"]["maghrib"], true);
    assert_eq!(days[1]["date"], "2025-01-05");
    assert!(days[1]["report"].is_null());
    assert_eq!(days[2]["date"], "2025-01-04");
    assert_eq!(days[2]["report"]["completed"], 1);
    assert_eq!(days[6]["date"], "2024-12-31");
    assert!(days.iter().skip(3).all(|d| d["report"].is_null()));

    let longer = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "reports.history",
        json!({ "studentId": student_id, "today": "2025-01-06", "days": 30 }),
    );
    let days = longer["days"].as_array().expect("days");
    assert_eq!(days.len(), 30);
    assert_eq!(days.iter().filter(|d| !d["report"].is_null()).count(), 3);

    let zero = request(
        &mut stdin,
        &mut reader,
        "5",
        "reports.history",
        json!({ "studentId": student_id, "days": 0 }),
    );
    assert_eq!(error_code(&zero), Some("bad_params"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn update_and_delete_validate_their_targets() {
    let workspace = temp_dir("sholat-update");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let no_ws = request(
        &mut stdin,
        &mut reader,
        "0",
        "reports.submit",
        json!({ "studentId": "x" }),
    );
    assert_eq!(error_code(&no_ws), Some("no_workspace"));

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let student_id = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "name": "Zaid", "gender": "L" }),
    )["studentId"]
        .as_str()
        .expect("studentId")
        .to_string();

    let unknown_student = request(
        &mut stdin,
        &mut reader,
        "3",
        "reports.submit",
        json!({ "studentId": "missing", "date": "2025-01-06" }),
    );
    assert_eq!(error_code(&unknown_student), Some("not_found"));

    let bad_date = request(
        &mut stdin,
        &mut reader,
        "4",
        "reports.submit",
        json!({ "studentId": student_id, "date": "2025-13-01" }),
    );
    assert_eq!(error_code(&bad_date), Some("bad_params"));

    let bad_flag = request(
        &mut stdin,
        &mut reader,
        "5",
        "reports.submit",
        json!({ "studentId": student_id, "date": "2025-01-06", "prayers": { "subuh": "yes" } }),
    );
    assert_eq!(error_code(&bad_flag), Some("bad_params"));

    let report_id = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "reports.submit",
        json!({
            "studentId": student_id,
            "date": "2025-01-06",
            "prayers": { "subuh": true, "isya": true }
        }),
    )["report"]["id"]
        .as_str()
        .expect("report id")
        .to_string();

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "reports.update",
        json!({ "reportId": report_id, "patch": { "subuh": false, "ashar": true } }),
    );
    assert_eq!(updated["report"]["subuh"], false);
    assert_eq!(updated["report"]["ashar"], true);
    assert_eq!(updated["report"]["isya"], true);
    assert_eq!(updated["report"]["completed"], 2);

    let missing = request(
        &mut stdin,
        &mut reader,
        "8",
        "reports.update",
        json!({ "reportId": "missing", "patch": { "subuh": true } }),
    );
    assert_eq!(error_code(&missing), Some("not_found"));

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "reports.delete",
        json!({ "reportId": report_id }),
    );
    assert_eq!(deleted["deleted"], report_id.as_str());
    let again = request(
        &mut stdin,
        &mut reader,
        "10",
        "reports.delete",
        json!({ "reportId": report_id }),
    );
    assert_eq!(error_code(&again), Some("not_found"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
