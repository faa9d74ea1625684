use super::commands::DownloadArgs;
use super::*;
use clap::CommandFactory;

fn parse(args: &[&str]) -> CliCommand {
    let cli = Cli::try_parse_from(args).unwrap();
    cli.command
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn cli_parse_download_defaults() {
    match parse(&["umd", "download", "https://example.com/ch1.json"]) {
        CliCommand::Download {
            urls,
            output,
            chapter_workers,
            image_workers,
            no_cbz,
            no_checksums,
        } => {
            assert_eq!(urls, vec!["https://example.com/ch1.json"]);
            assert!(output.is_none());
            assert!(chapter_workers.is_none() && image_workers.is_none());
            assert!(!no_cbz && !no_checksums);
        }
        _ => panic!("expected Download"),
    }
}

#[test]
fn cli_parse_download_with_options() {
    match parse(&[
        "umd",
        "download",
        "https://a.example/1.json",
        "https://a.example/2.json",
        "--output",
        "/tmp/manga",
        "--chapter-workers",
        "3",
        "--image-workers",
        "8",
        "--no-cbz",
        "--no-checksums",
    ]) {
        CliCommand::Download {
            urls,
            output,
            chapter_workers,
            image_workers,
            no_cbz,
            no_checksums,
        } => {
            assert_eq!(urls.len(), 2);
            assert_eq!(output.as_deref(), Some(std::path::Path::new("/tmp/manga")));
            assert_eq!(chapter_workers, Some(3));
            assert_eq!(image_workers, Some(8));
            assert!(no_cbz && no_checksums);
        }
        _ => panic!("expected Download"),
    }
}

#[test]
fn cli_download_requires_url() {
    assert!(Cli::try_parse_from(["umd", "download"]).is_err());
}

#[test]
fn cli_parse_config_and_completions() {
    assert!(matches!(parse(&["umd", "config"]), CliCommand::Config));
    match parse(&["umd", "completions", "bash"]) {
        CliCommand::Completions { shell } => assert_eq!(shell, Shell::Bash),
        _ => panic!("expected Completions"),
    }
    assert!(Cli::try_parse_from(["umd", "completions", "cmd.exe"]).is_err());
}

#[test]
fn download_flags_override_config() {
    let mut cfg = umd_core::config::UmdConfig::default();
    let args = DownloadArgs {
        urls: vec!["https://example.com/x.json".into()],
        output: Some("/srv/manga".into()),
        chapter_workers: Some(4),
        image_workers: None,
        ..Default::default()
    };
    args.apply(&mut cfg);
    assert_eq!(
        cfg.download.download_dir.as_deref(),
        Some(std::path::Path::new("/srv/manga"))
    );
    assert_eq!(cfg.download.chapter_workers, 4);
    assert_eq!(cfg.download.image_workers, 4);
}

#[test]
fn events_render_as_status_lines() {
    use super::commands::download::render_event;
    use umd_core::task::UiEvent;

    assert_eq!(
        render_event(&UiEvent::Status {
            id: 2,
            status: "Downloading images (3/10)…".into(),
            state: None,
        })
        .as_deref(),
        Some("[2] Downloading images (3/10)…")
    );
    assert_eq!(
        render_event(&UiEvent::Finished {
            id: 2,
            success: false,
            message: Some("No images found.".into()),
        })
        .as_deref(),
        Some("[2] FAILED: No images found.")
    );
    assert!(render_event(&UiEvent::Progress {
        id: 2,
        value: 3,
        maximum: None
    })
    .is_none());
}
