use md5::{Digest, Md5};
use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};

const MD5_EMPTY: &str = "d41d8cd98f00b204e9800998ecf8427e";

fn mediaverify(args: &[&str], source: Option<&Path>) -> Output {
    let bin = env!("CARGO_BIN_EXE_mediaverify");
    let mut command = Command::new(bin);
    command.args(args);
    if let Some(source) = source {
        command.arg(source);
    }
    command
        .env_remove("MEDIAVERIFY_LOG")
        .output()
        .expect("run mediaverify")
}

/// Sysfs attributes report a 4096-byte size but hold only a few bytes, so the
/// verifier hits end of file before the reported size.
const SHORT_SYSFS_FILE: &str = "/sys/devices/system/cpu/online";

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn empty_image_verifies_with_empty_md5() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let image = temp_dir.path().join("empty.iso");
    let log = temp_dir.path().join("verify.log");
    fs::write(&image, b"").expect("write image");

    let output = mediaverify(&["-q", "-l", log.to_str().expect("utf8 path")], Some(&image));
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr_of(&output));

    let stdout = stdout_of(&output);
    assert!(stdout.contains(&format!("MD5 hash calculated over data:\t{MD5_EMPTY}")));
    assert!(stdout.contains("No read errors."));
    assert!(stdout.trim_end().ends_with("mediaverify: SUCCESS"));

    let content = fs::read_to_string(&log).expect("read log");
    assert_eq!(content, format!("md5:{MD5_EMPTY}\n"));
}

#[test]
fn additional_digests_are_logged_in_order() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let image = temp_dir.path().join("abc.iso");
    let log = temp_dir.path().join("verify.log");
    fs::write(&image, b"abc").expect("write image");

    let output = mediaverify(
        &["-q", "-p", "1", "-d", "SHA256,sha1", "-l", log.to_str().expect("utf8 path")],
        Some(&image),
    );
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr_of(&output));

    let content = fs::read_to_string(&log).expect("read log");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines,
        vec![
            "md5:900150983cd24fb0d6963f7d28e17f72",
            "sha1:a9993e364706816aba3e25717850c26c9cd0d89d",
            "sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
        ]
    );
    assert!(stdout_of(&output).contains("SHA256 hash calculated over data:"));
}

#[test]
fn unsupported_digest_type_fails_before_reading() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let image = temp_dir.path().join("data.iso");
    let log = temp_dir.path().join("verify.log");
    fs::write(&image, vec![0u8; 64]).expect("write image");

    let output = mediaverify(
        &["-q", "-d", "sha512", "-l", log.to_str().expect("utf8 path")],
        Some(&image),
    );
    assert_eq!(output.status.code(), Some(1));
    let stderr = stderr_of(&output);
    assert!(stderr.contains("unable to set additional digest types"));
    assert!(stderr.contains("sha512"));
    assert!(!stdout_of(&output).contains("hash calculated over data"));
    assert!(!log.exists());
}

#[test]
fn invalid_chunk_size_falls_back_to_default() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let image = temp_dir.path().join("data.iso");
    fs::write(&image, b"abc").expect("write image");

    for value in ["0", "not-a-size", "99999999999999999999g"] {
        let output = mediaverify(&["-q", "-p", value], Some(&image));
        assert_eq!(output.status.code(), Some(0), "value {value}");
        assert!(stderr_of(&output)
            .contains("Unsupported process buffer size defaulting to: 32768."));
        assert!(stdout_of(&output)
            .contains("MD5 hash calculated over data:\t900150983cd24fb0d6963f7d28e17f72"));
    }
}

#[test]
fn missing_source_is_an_open_error() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let image = temp_dir.path().join("absent.iso");

    let output = mediaverify(&["-q"], Some(&image));
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_of(&output).contains("unable to open file"));
    assert!(stdout_of(&output).contains("mediaverify: FAILURE"));
}

#[test]
fn missing_positional_argument_exits_with_failure() {
    let output = mediaverify(&["-q"], None);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_of(&output).contains("Usage"));
}

#[test]
fn help_and_version_exit_cleanly() {
    let help = mediaverify(&["-h"], None);
    assert_eq!(help.status.code(), Some(0));
    assert!(stdout_of(&help).contains("-d <DIGEST_TYPES>"));

    let version = mediaverify(&["-V"], None);
    assert_eq!(version.status.code(), Some(0));
    assert!(stdout_of(&version).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn log_is_written_when_stdout_fails() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let image = temp_dir.path().join("abc.iso");
    let log = temp_dir.path().join("verify.log");
    fs::write(&image, b"abc").expect("write image");
    let Ok(full) = fs::OpenOptions::new().write(true).open("/dev/full") else {
        eprintln!("skipping: /dev/full is unavailable");
        return;
    };

    let output = Command::new(env!("CARGO_BIN_EXE_mediaverify"))
        .args(["-q", "-l", log.to_str().expect("utf8 path")])
        .arg(&image)
        .env_remove("MEDIAVERIFY_LOG")
        .stdout(Stdio::from(full))
        .output()
        .expect("run mediaverify");

    let stderr = stderr_of(&output);
    assert_eq!(output.status.code(), Some(0), "stderr: {stderr}");
    assert!(stderr.contains("unable to write status summary"));
    assert!(!stderr.contains("panicked"));
    let content = fs::read_to_string(&log).expect("read log");
    assert_eq!(content, "md5:900150983cd24fb0d6963f7d28e17f72\n");
}

#[test]
fn unreadable_tail_fails_and_logs_the_range() {
    let path = Path::new(SHORT_SYSFS_FILE);
    let (Ok(metadata), Ok(content)) = (fs::metadata(path), fs::read(path)) else {
        eprintln!("skipping: {SHORT_SYSFS_FILE} is unavailable");
        return;
    };
    let reported = metadata.len();
    if content.is_empty() || content.len() as u64 >= reported {
        eprintln!("skipping: {SHORT_SYSFS_FILE} does not end early");
        return;
    }
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let log = temp_dir.path().join("verify.log");

    let output = mediaverify(
        &["-q", "-p", "64k", "-l", log.to_str().expect("utf8 path")],
        Some(path),
    );
    assert_eq!(output.status.code(), Some(1), "stderr: {}", stderr_of(&output));

    let read = content.len() as u64;
    let expected = format!(
        "{read},{}\nmd5:{}\n",
        reported - read,
        hex::encode(Md5::digest(&content))
    );
    assert_eq!(fs::read_to_string(&log).expect("read log"), expected);

    let stdout = stdout_of(&output);
    assert!(stdout.contains("Read errors: total number: 1"));
    assert!(stdout.contains(&format!("\tat offset {read} (0x{read:08x}) of size {}", reported - read)));
    assert!(stdout.trim_end().ends_with("mediaverify: FAILURE"));
}
