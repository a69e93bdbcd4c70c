//! menuhin CLI
//!
//! Commands:
//! - `check`: Validate the configuration file
//! - `import-urls`: Import the static menus' URLs into the store, after confirmation
//! - `update-menus`: Sync one site's menu entries and menu records
//! - `show`: Render the breadcrumbs and menu a request path would see

use clap::{Parser, Subcommand};
use menuhin::{
    config::{check_settings, CheckLevel, ConfigProvider, MenuhinConfig, TomlConfigProvider},
    navigation::{breadcrumbs, show_menu},
    reconcile::{ensure_default_for_site, find_missing, sync_site},
    registry::{MenuContext, MenuRegistry},
    request::MenuRequest,
    store::MemoryStore,
    MenuError,
};
use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

/// URLs listed per menu before the listing is summarized.
const LISTING_LIMIT: usize = 10;

#[derive(Parser)]
#[command(name = "menuhin")]
#[command(author, version, about = "Site navigation menus: URL import, sync and inspection", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "menuhin.toml")]
    config: PathBuf,

    /// JSON snapshot of the menu store
    #[arg(long, global = true, default_value = "menuhin.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configuration checks and report every message
    Check,

    /// Import every static menu URL missing from the store
    ImportUrls {
        /// Do not prompt for confirmation
        #[arg(long)]
        noinput: bool,
    },

    /// Add missing URLs for a site, apply the stale policy and create menu records
    UpdateMenus {
        /// Site to update (defaults to the configured site_id)
        #[arg(long)]
        site: Option<u64>,

        /// Report what would change without writing the store
        #[arg(long)]
        dry_run: bool,
    },

    /// Show breadcrumbs and the menu for a request path
    Show {
        /// Request path, query string included
        #[arg(short, long)]
        path: String,

        /// Menu to render: an entry id, a menu slug or a uri
        #[arg(short, long, default_value = "default")]
        menu: String,

        /// Levels below the menu root
        #[arg(short, long, default_value = "100")]
        levels: usize,
    },
}

fn static_context(config: &MenuhinConfig) -> Result<MenuContext, MenuError> {
    let mut registry = MenuRegistry::new();
    for menu in config.static_menus.iter() {
        registry.register(Arc::new(menu.clone()))?;
    }
    Ok(MenuContext::new(registry, config.pipeline()))
}

fn confirm(message: &str) -> Result<bool, MenuError> {
    print!("{message} [y/N] ");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim(), "y" | "Y" | "yes" | "YES"))
}

fn import_urls(config: &MenuhinConfig, store_path: &Path, noinput: bool) -> Result<(), MenuError> {
    let registry = config.url_registry();
    let mut store = MemoryStore::load_or_default(store_path)?;
    let Some(missing) = registry.items_to_update(&store, config.site_id)? else {
        println!("No URLs need to be imported.");
        return Ok(());
    };

    let mut listing = registry.list()?;
    listing.retain(|(_, uri)| missing.contains(uri));
    let mut current: Option<&str> = None;
    let mut shown = 0;
    for (index, (menu, uri)) in listing.iter().enumerate() {
        if current != Some(menu.as_str()) {
            println!("Menu: {menu}");
            current = Some(menu.as_str());
            shown = 0;
        }
        shown += 1;
        if shown <= LISTING_LIMIT {
            println!("\tURL: {}", uri.path);
        } else if shown == LISTING_LIMIT + 1 {
            let rest = listing[index..]
                .iter()
                .take_while(|(m, _)| m == menu)
                .count();
            println!("\t + {rest} more ...");
        }
    }

    if !noinput && !confirm("Would you like to import the URLs listed?")? {
        return Err(MenuError::Cancelled("Importing URLs cancelled".to_string()));
    }
    let imported = registry.update(&mut store, config.site_id)?.unwrap_or_default();
    store.save(store_path)?;
    println!("Imported {} URLs successfully", imported.len());
    Ok(())
}

fn update_menus(
    config: &MenuhinConfig,
    store_path: &Path,
    site: u64,
    dry_run: bool,
) -> Result<(), MenuError> {
    let urls = config.url_registry().all_urls()?;
    let mut store = MemoryStore::load_or_default(store_path)?;

    if dry_run {
        println!("This is a dry-run, nothing will be written to {store_path:?}");
        match find_missing(&store, &urls, site)? {
            None => println!("No URLs need to be added, yay!"),
            Some(missing) => {
                println!("The following URLs are missing and would be installed:");
                for uri in missing {
                    println!("\t{}", uri.path);
                }
            }
        }
        return Ok(());
    }

    if ensure_default_for_site(&mut store, site)?.created {
        println!("Created the default menu root for site {site}");
    }
    let report = sync_site(&mut store, &urls, site, config.stale_policy)?;
    for (path, reason) in report.failed.iter() {
        println!("\tFAILED {path}: {reason}");
    }
    println!("Site {site}: {report}");

    let context = static_context(config)?;
    for (record, created) in context.registry().get_or_create(&mut store, site)? {
        if created {
            println!("Created menu '{}' ({})", record.slug, record.display_title);
        }
    }
    store.save(store_path)
}

fn show(
    config: &MenuhinConfig,
    store_path: &Path,
    path: &str,
    menu: &str,
    levels: usize,
) -> Result<(), MenuError> {
    let request = MenuRequest::new(path)?;
    let store = MemoryStore::load_or_default(store_path)?;
    let site = config.site_id;

    let trail = breadcrumbs(&store, site, "", Some(&request))?;
    if trail.is_empty() {
        println!("Breadcrumbs: (no stored entry for {path})");
    } else {
        let titles = trail.iter().map(|e| e.title.as_str()).collect::<Vec<_>>();
        println!("Breadcrumbs: {}", titles.join(" > "));
    }

    match show_menu(&store, site, menu, Some(&request), config.depth_start, levels)? {
        None => println!("Menu '{menu}': not found"),
        Some(shown) => {
            println!("Menu '{menu}' rooted at {}", shown.root.uri);
            for row in shown.nodes.iter() {
                let marker = if row.is_active() {
                    "*"
                } else if row.is_ancestor() {
                    ">"
                } else {
                    " "
                };
                println!(
                    "{marker} {}{} ({})",
                    "  ".repeat(row.info.level),
                    row.entry.title,
                    row.entry.uri
                );
            }
        }
    }

    let context = static_context(config)?;
    context.load_menus(&store, site)?;
    let crumbs = context.breadcrumbs_for(&request, None)?;
    if !crumbs.is_empty() {
        let titles = crumbs.iter().map(|c| c.title.as_str()).collect::<Vec<_>>();
        println!("Static menu trail: {}", titles.join(" > "));
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), MenuError> {
    let config = TomlConfigProvider::new(cli.config.clone()).get_config()?;

    match cli.command {
        Commands::Check => {
            let messages = check_settings(&config);
            if messages.is_empty() {
                println!("System check identified no issues.");
            }
            for message in messages.iter() {
                println!("{message}");
            }
            if messages.iter().any(|m| m.level == CheckLevel::Error) {
                return Err(MenuError::Configuration(format!(
                    "{:?} failed the system checks",
                    cli.config
                )));
            }
            tracing::debug!("decoration pipeline: {:?}", config.pipeline().names());
            Ok(())
        }
        Commands::ImportUrls { noinput } => import_urls(&config, &cli.store, noinput),
        Commands::UpdateMenus { site, dry_run } => {
            update_menus(&config, &cli.store, site.unwrap_or(config.site_id), dry_run)
        }
        Commands::Show { path, menu, levels } => show(&config, &cli.store, &path, &menu, levels),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        tracing::error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
