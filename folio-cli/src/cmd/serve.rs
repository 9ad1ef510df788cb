use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use folio_core::{BuildReport, SiteBuilder};
use folio_dev_server::{LiveServer, LiveServerConfig, ReloadHandle, livereload_script};
use log::{debug, error, info, warn};
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use super::add_build_args;
use crate::config::FolioConfig;

/// Changes closer together than this become one rebuild.
const DEBOUNCE: Duration = Duration::from_secs(1);

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("serve"))
        .about("Build, serve, and rebuild on change with live reload")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to serve on")
                .default_value("8000"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Host to bind to")
                .default_value("127.0.0.1"),
        )
        .arg(
            Arg::new("open")
                .long("open")
                .help("Open browser automatically")
                .action(clap::ArgAction::SetTrue),
        )
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    // Load cascading configuration
    let config = FolioConfig::load(args)?;
    let build_config = config.build_config().clone();
    let script = livereload_script(&build_config.host, build_config.port);

    // The first build has to work; later failures are only logged.
    let report = site_builder(&config, &script)?.build()?;
    info!("Initial build: {} pages", report.pages);

    let server = LiveServer::new(LiveServerConfig {
        host: build_config.host.clone(),
        port: build_config.port,
        root: build_config.output_dir(),
        open: build_config.open,
    });
    let reload = server.reload_handle();

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Dev server error: {:#}", e);
        }
    });

    // Watch source files and rebuild on changes
    let args = args.clone();
    let watcher_handle = tokio::spawn(async move {
        if let Err(e) = watch_and_rebuild(args, script, reload).await {
            error!("Source watcher error: {:#}", e);
        }
    });

    // Wait for both tasks
    let _ = tokio::try_join!(server_handle, watcher_handle)?;

    Ok(())
}

fn site_builder(config: &FolioConfig, livereload: &str) -> Result<SiteBuilder> {
    let build_config = config.build_config();

    let builder = SiteBuilder::new()
        .content_dir(build_config.content_dir())
        .output_dir(build_config.output_dir())
        .theme_dir(build_config.theme_dir())
        .static_dir(build_config.static_path())
        .config(config.site.clone())
        .global("livereload", livereload)?;

    Ok(builder)
}

/// Re-read the configuration (it may be what changed) and build once.
fn rebuild(args: &ArgMatches, livereload: &str) -> Result<BuildReport> {
    let config = FolioConfig::load(args)?;
    let report = site_builder(&config, livereload)?.build()?;
    Ok(report)
}

/// True if `path` lies under one of the watched `roots` and not in the
/// output directory.
fn is_source_change(path: &Path, roots: &[PathBuf], output_dir: &Path) -> bool {
    let abs = |p: &Path| p.canonicalize().unwrap_or_else(|_| p.to_path_buf());

    let path = abs(path);
    if path.starts_with(abs(output_dir)) {
        return false;
    }
    roots.iter().any(|root| path.starts_with(abs(root)))
}

async fn watch_and_rebuild(args: ArgMatches, livereload: String, reload: ReloadHandle) -> Result<()> {
    let config = FolioConfig::load(&args)?;
    let build_config = config.build_config();
    let output_dir = build_config.output_dir();

    let (tx, mut rx) = tokio::sync::mpsc::channel::<Vec<PathBuf>>(16);

    let mut debouncer = new_debouncer(DEBOUNCE, move |res: DebounceEventResult| match res {
        Ok(events) => {
            let paths: Vec<PathBuf> = events.into_iter().map(|event| event.path).collect();
            let _ = tx.blocking_send(paths);
        }
        Err(e) => warn!("Watch error: {}", e),
    })?;

    let mut roots = Vec::new();
    for dir in [
        build_config.content_dir(),
        build_config.theme_dir(),
        build_config.static_path(),
    ] {
        if dir.exists() {
            debouncer.watcher().watch(&dir, RecursiveMode::Recursive)?;
            info!("Watching {}", dir.display());
            roots.push(dir);
        }
    }

    let config_file = build_config.config_file();
    if config_file.exists() {
        debouncer
            .watcher()
            .watch(&config_file, RecursiveMode::NonRecursive)?;
        info!("Watching config file {}", config_file.display());
        roots.push(config_file);
    }

    // One batch at a time: the next batch is not read until the current
    // build has finished, so builds never overlap.
    while let Some(mut batch) = rx.recv().await {
        // Anything that queued up during the last build goes into this one.
        while let Ok(more) = rx.try_recv() {
            batch.extend(more);
        }

        let changed: Vec<&PathBuf> = batch
            .iter()
            .filter(|path| is_source_change(path, &roots, &output_dir))
            .collect();
        let Some(first) = changed.first() else {
            debug!("Skipping {} non-source change(s)", batch.len());
            continue;
        };
        info!("{} change(s), starting with {}; rebuilding", changed.len(), first.display());

        let args = args.clone();
        let livereload = livereload.clone();
        match tokio::task::spawn_blocking(move || rebuild(&args, &livereload)).await {
            Ok(Ok(report)) => {
                info!("Site rebuilt: {} pages", report.pages);
                reload.reload();
            }
            Ok(Err(e)) => error!("Build failed: {:#}", e),
            Err(e) => error!("Build task failed: {}", e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_is_source_change() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for sub in ["content/blog", "theme", "output/blog", "elsewhere"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        fs::write(root.join("content/blog/a.md"), "a").unwrap();
        fs::write(root.join("output/blog/a.html"), "a").unwrap();

        let roots = vec![root.join("content"), root.join("theme")];
        let output = root.join("output");

        assert!(is_source_change(&root.join("content/blog/a.md"), &roots, &output));
        // Deleted files cannot be canonicalized but still count.
        assert!(is_source_change(&root.join("theme/gone.html"), &roots, &output));
        assert!(!is_source_change(&root.join("output/blog/a.html"), &roots, &output));
        assert!(!is_source_change(&root.join("elsewhere/x"), &roots, &output));
    }

    #[test]
    fn test_output_inside_content_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let content = dir.path().join("content");
        fs::create_dir_all(content.join("_site")).unwrap();

        let roots = vec![content.clone()];
        assert!(!is_source_change(&content.join("_site/index.html"), &roots, &content.join("_site")));
    }

    #[test]
    fn test_serve_args() {
        let matches = make_subcommand()
            .try_get_matches_from(vec!["serve", "--port", "4000", "--open"])
            .unwrap();

        let config = FolioConfig::load(&matches).unwrap();
        assert_eq!(config.build.port, 4000);
        assert!(config.build.open);
        assert_eq!(config.build.host, "127.0.0.1");
    }
}
