use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn kba_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("kba");
    path
}

const SCHEDULE_MD: &str = "\
# Spring 2025 Meeting Schedule

* 1/22/25 6:00PM General Meeting
  * Location: Business Hall 101
* 2/5/25 6:30PM Professional Development
  * Location: Room 204
* 2/19/25 6:00PM Networking Night
* 3/1/25 10:00AM Community Service

# Fall 2025
* TBD
";

const REQUIREMENTS_MD: &str = "\
# Membership Requirements

## Candidate Eligibility
- Declared accounting, finance, or IS major

## Candidacy Requirements
- Attend 3 professional events

## Standards

**GPA Requirements:**
- 3.0 cumulative GPA
- 3.0 GPA in major

**Attendance Requirements:**
- Attend at least 3 general meetings
";

const DUES_MD: &str = "\
# Dues

Semester dues are $50 and are collected at the first general meeting.
";

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let kb_dir = root.join("knowledge_base");
    fs::create_dir_all(&kb_dir).unwrap();
    fs::write(kb_dir.join("meeting_schedule.md"), SCHEDULE_MD).unwrap();
    fs::write(kb_dir.join("membership_requirements.md"), REQUIREMENTS_MD).unwrap();
    fs::write(kb_dir.join("dues.md"), DUES_MD).unwrap();
    fs::write(kb_dir.join("notes.txt"), "not loaded").unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_content = format!(
        r#"[knowledge_base]
dir = "{}/knowledge_base"

[routing]
context_k = 3

[generation]
provider = "disabled"
"#,
        root.display()
    );
    let config_path = config_dir.join("kba.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_kba(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = kba_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run kba binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_topics_lists_loaded_documents() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_kba(&config_path, &["topics"]);
    assert!(success, "topics failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("meeting_schedule"));
    assert!(stdout.contains("membership_requirements"));
    assert!(stdout.contains("dues"));
    assert!(!stdout.contains("notes"));
    assert!(stdout.contains("3 loaded, 0 replaced, 0 skipped, 1 unsupported"));
}

#[test]
fn test_ask_next_meeting_with_pinned_clock() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_kba(
        &config_path,
        &["ask", "When is the next meeting?", "--now", "2025-01-25"],
    );
    assert!(success, "ask failed: stderr={}", stderr);
    assert_eq!(
        stdout.trim_end(),
        "Next meeting:\n- 2/5/25 6:30PM Professional Development\n  - Location: Room 204"
    );
}

#[test]
fn test_ask_after_last_meeting_reports_missing() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_kba(
        &config_path,
        &["ask", "next meeting?", "--now", "2025-06-01T12:00"],
    );
    assert!(success);
    assert!(stdout.starts_with("I couldn't find an upcoming meeting"));
    assert!(stdout.contains("chapter leadership"));
}

#[test]
fn test_ask_month_meetings() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_kba(&config_path, &["ask", "Anything in February?"]);
    assert!(success);
    let text = stdout.trim_end();
    assert!(text.starts_with("- 2/5/25"));
    assert!(text.contains("\n\n- 2/19/25 6:00PM Networking Night"));
    assert!(!text.contains("3/1/25"));
}

#[test]
fn test_ask_gpa_requirement() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_kba(&config_path, &["ask", "What GPA do I need to join?"]);
    assert!(success);
    assert_eq!(stdout.trim_end(), "3.0 cumulative GPA\n3.0 GPA in major");
}

#[test]
fn test_ask_full_schedule() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_kba(&config_path, &["ask", "What's the meeting schedule?"]);
    assert!(success);
    assert!(stdout.starts_with("# Spring 2025 Meeting Schedule"));
    assert!(stdout.contains("- 3/1/25 10:00AM Community Service"));
    assert!(!stdout.contains("Fall 2025"));
}

#[test]
fn test_ask_unknown_first_turn_gets_no_information_reply() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_kba(&config_path, &["ask", "Who won the 1998 World Cup?"]);
    assert!(success);
    assert!(stdout.starts_with("Apologies, I'm not trained on that information just yet."));
}

#[test]
fn test_ask_search_hit_with_generation_disabled() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_kba(&config_path, &["ask", "semester dues"]);
    assert!(success, "a generation failure must not fail the command");
    assert_eq!(
        stdout.trim_end(),
        "Sorry, I couldn't reach the answer service right now. Please try again later."
    );
}

#[test]
fn test_search_lists_matches() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_kba(&config_path, &["search", "general meeting"]);
    assert!(success);
    assert!(stdout.contains("1. ["));
    assert!(stdout.contains("meeting_schedule"));
    assert!(stdout.contains("dues"));

    let (stdout, _, success) = run_kba(&config_path, &["search", "parking permits"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_deterministic() {
    let (_tmp, config_path) = setup_test_env();

    let (first, _, _) = run_kba(&config_path, &["search", "meeting"]);
    let (second, _, _) = run_kba(&config_path, &["search", "meeting"]);
    assert_eq!(first, second);
}

#[test]
fn test_section_command() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_kba(
        &config_path,
        &["section", "membership_requirements", "Candidacy Requirements"],
    );
    assert!(success);
    assert_eq!(
        stdout.trim_end(),
        "## Candidacy Requirements\n- Attend 3 professional events"
    );

    let (_, stderr, success) = run_kba(&config_path, &["section", "missing_topic", "## Dues"]);
    assert!(!success);
    assert!(stderr.contains("Unknown topic"));
}

#[test]
fn test_chat_keeps_session_until_exit() {
    let (_tmp, config_path) = setup_test_env();

    let binary = kba_binary();
    let mut child = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(["chat", "--now", "2025-01-25"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"What are the attendance requirements?\nquit\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("**Attendance Requirements:**\n- Attend at least 3 general meetings"));
}

#[test]
fn test_missing_knowledge_base_is_fatal() {
    let (tmp, config_path) = setup_test_env();
    fs::remove_dir_all(tmp.path().join("knowledge_base")).unwrap();

    let (_, stderr, success) = run_kba(&config_path, &["topics"]);
    assert!(!success);
    assert!(stderr.contains("Failed to load knowledge base"));
}

#[test]
fn test_kb_dir_override_without_config_file() {
    let (tmp, _config_path) = setup_test_env();
    let empty = tmp.path().join("elsewhere");
    fs::create_dir_all(&empty).unwrap();

    let output = Command::new(kba_binary())
        .current_dir(&empty)
        .env_remove("OPENAI_API_KEY")
        .args(["topics", "--kb-dir"])
        .arg(tmp.path().join("knowledge_base"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("3 loaded"));
}

#[test]
fn test_invalid_now_is_rejected() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_kba(&config_path, &["ask", "next meeting", "--now", "soon"]);
    assert!(!success);
    assert!(stderr.contains("Invalid --now value"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config_path) = setup_test_env();
    fs::write(&config_path, "[generation]\nprovider = \"mystery\"\n").unwrap();

    let (_, stderr, success) = run_kba(&config_path, &["topics"]);
    assert!(!success);
    assert!(stderr.contains("Unknown generation provider"));
}
