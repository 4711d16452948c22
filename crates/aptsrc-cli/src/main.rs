use std::{env, fs, path::PathBuf};

use aptsrc_config::{
    config::{generate_default_config, Config, CONFIG_PATH},
    error::ConfigError,
};
use aptsrc_core::{
    error::{ErrorContext, SourcesError},
    CollapsedSourcesList, SourcesList, SourcesResult,
};
use aptsrc_utils::path::resolve_path;
use clap::Parser;
use cli::{Args, Commands};
use edit::{add_source, check_line, remove_sources, set_enabled, show_relations, AddOptions};
use list::{list_collapsed, list_sources};
use logging::setup_logging;
use tracing::{debug, info, warn};
use utils::{confirm_action, disable_color};

mod cli;
mod edit;
mod list;
mod logging;
mod utils;

fn set_config_path(config: &str) -> SourcesResult<()> {
    let path = resolve_path(config)?;
    let path = if path.is_absolute() {
        path
    } else {
        env::current_dir()
            .with_context(|| "retrieving current directory".into())?
            .join(path)
    };

    debug!("Using config file {}", path.display());
    let mut config_path = CONFIG_PATH
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *config_path = path;
    Ok(())
}

fn config_path() -> PathBuf {
    CONFIG_PATH
        .read()
        .map(|path| path.to_path_buf())
        .unwrap_or_else(|poisoned| poisoned.into_inner().to_path_buf())
}

fn print_config() -> SourcesResult<()> {
    let path = config_path();
    match fs::read_to_string(&path) {
        Ok(content) => info!("{content}"),
        Err(_) => {
            warn!(
                "Config file {} not found, showing the defaults",
                path.display()
            );
            let content = toml::to_string_pretty(&Config::default_config())
                .map_err(ConfigError::from)?;
            info!("{content}");
        }
    }
    Ok(())
}

fn print_env(config: &Config) -> SourcesResult<()> {
    info!("APTSRC_CONFIG={}", config_path().display());
    info!("APTSRC_SOURCELIST={}", config.get_sourcelist_path()?.display());
    info!(
        "APTSRC_SOURCEPARTS={}",
        config.get_sourceparts_path()?.display()
    );
    info!("APTSRC_TEMPLATES={}", config.get_templates_path()?.display());
    Ok(())
}

fn handle_cli() -> SourcesResult<()> {
    let args = Args::parse();

    setup_logging(&args);

    if args.no_color {
        disable_color();
    }

    if let Some(ref c) = args.config {
        set_config_path(c)?;
    }

    match args.command {
        Commands::DefConfig => generate_default_config()?,
        Commands::Config => print_config()?,
        command => {
            let config = Config::new()?;

            if let Commands::Env = command {
                return print_env(&config);
            }

            let mut sources = SourcesList::from_config(&config)?;

            match command {
                Commands::List {
                    collapsed,
                    all,
                } => {
                    if collapsed {
                        list_collapsed(&CollapsedSourcesList::new(sources))?;
                    } else {
                        list_sources(&sources, all)?;
                    }
                }
                Commands::Add {
                    uri,
                    dist,
                    components,
                    source_type,
                    arch,
                    disabled,
                    comment,
                    file,
                    position,
                    collapsed,
                } => {
                    let file = file.as_deref().map(resolve_path).transpose()?;
                    let options = AddOptions {
                        uri,
                        dist,
                        components,
                        source_type,
                        arch,
                        disabled,
                        comment,
                        file,
                        position,
                        collapsed,
                    };
                    add_source(sources, options)?;
                }
                Commands::Enable {
                    lines,
                } => set_enabled(&mut sources, &lines, true)?,
                Commands::Disable {
                    lines,
                } => set_enabled(&mut sources, &lines, false)?,
                Commands::Remove {
                    lines,
                    components,
                } => {
                    remove_sources(sources, &lines, &components)?;
                }
                Commands::Check {
                    line,
                } => check_line(&sources, &line)?,
                Commands::Relations => show_relations(&sources)?,
                Commands::Backup {
                    ext,
                } => {
                    let ext = sources.backup(ext.as_deref())?;
                    info!("Restore with: aptsrc restore {ext}");
                }
                Commands::Restore {
                    ext,
                    yes,
                } => {
                    if !yes
                        && !confirm_action(&format!(
                            "Overwrite the sources files with backup '{ext}'?"
                        ))?
                    {
                        info!("Restore cancelled");
                        return Ok(());
                    }
                    if sources.restore_backup(&ext)? == 0 {
                        return Err(SourcesError::Custom(format!(
                            "No backup files with extension '{ext}' found"
                        )));
                    }
                }
                Commands::DefConfig | Commands::Config | Commands::Env => {}
            }
        }
    }

    Ok(())
}

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli() {
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}
