use clap::Parser;
use gallery_sync::cli::Cli;
use gallery_sync::error::ExitCode;
use gallery_sync::run_app;
use tempfile::{tempdir, TempDir};

fn cli(dir: &TempDir, args: &[&str]) -> Cli {
    let root = dir.path();
    let mut argv = vec![
        "gallery-sync".to_string(),
        "-q".to_string(),
        "--config".to_string(),
        root.join("absent.toml").display().to_string(),
        "--images-dir".to_string(),
        root.join("images").display().to_string(),
        "--database".to_string(),
        root.join("gallery.db").display().to_string(),
    ];
    argv.extend(args.iter().map(ToString::to_string));
    Cli::parse_from(argv)
}

#[test]
fn test_tags_on_empty_gallery() {
    let dir = tempdir().unwrap();
    let code = run_app(cli(&dir, &["tags"])).unwrap();
    assert_eq!(code, ExitCode::Success);
    assert!(dir.path().join("images").is_dir());
    assert!(dir.path().join("gallery.db").exists());
}

#[test]
fn test_list_json_on_empty_gallery() {
    let dir = tempdir().unwrap();
    let code = run_app(cli(&dir, &["list", "--json"])).unwrap();
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_delete_missing_exits_not_found() {
    let dir = tempdir().unwrap();
    let err = run_app(cli(&dir, &["delete", "ghost.jpg"])).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::NotFound);
}

#[test]
fn test_sync_without_token_is_an_error() {
    let dir = tempdir().unwrap();
    let err = run_app(cli(&dir, &["sync"])).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
    assert!(err.to_string().contains("access_token"));
}
