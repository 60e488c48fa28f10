//! Build script rendering the `blueprint-sync` man pages.
//!
//! Packaging picks the pages up from `OUT_DIR`: `blueprint-sync.1` for the
//! binary and `blueprint-sync-<subcommand>.1` for `check`, `links` and `sync`.

use std::env;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir = PathBuf::from(
        env::var_os("OUT_DIR")
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "OUT_DIR was not set"))?,
    );

    let command = Cli::command();
    render_page(&out_dir, "blueprint-sync.1", command.clone())?;
    for subcommand in command.get_subcommands() {
        let page = format!("blueprint-sync-{}.1", subcommand.get_name());
        render_page(&out_dir, &page, subcommand.clone())?;
    }

    Ok(())
}

fn render_page(out_dir: &Path, file_name: &str, command: clap::Command) -> io::Result<()> {
    let mut buffer = Vec::new();
    Man::new(command).render(&mut buffer)?;
    File::create(out_dir.join(file_name))?.write_all(&buffer)
}
