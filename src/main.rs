use anyhow::Result;
use bible_versification::cli::Cli;
use bible_versification::tool::VersificationTool;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut tool = VersificationTool::new(&cli)?;
    tool.run(&cli.command)?;
    tool.finalize()?;
    Ok(())
}
