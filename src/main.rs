use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "slide-captioner",
    version,
    about = "Caption presentation images with a local vision-language model"
)]
struct Cli {
    /// Path to the input .ppt or .pptx file
    #[arg(long = "ppt", required_unless_present = "serve")]
    ppt: Option<String>,

    /// Directory to save session data
    #[arg(long = "out", default_value = "session_data")]
    out: String,

    /// Captioning model name
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// Captioning service base URL (default from settings)
    #[arg(long = "endpoint")]
    endpoint: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Run the web form instead of processing one file
    #[arg(long = "serve")]
    serve: bool,

    /// Bind address for --serve
    #[arg(long = "addr", default_value = "127.0.0.1:8080")]
    addr: String,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    slide_captioner::logging::init(cli.verbose)?;

    if cli.serve {
        let settings_path = cli.read_settings.as_deref().map(std::path::Path::new);
        let settings = slide_captioner::settings::load_settings(settings_path)?;
        return slide_captioner::server::run_server(settings, cli.addr).await;
    }

    let Some(ppt) = cli.ppt else {
        return Err(anyhow::anyhow!("--ppt is required"));
    };
    let output = slide_captioner::run(slide_captioner::Config {
        ppt,
        out: cli.out,
        model: cli.model,
        endpoint: cli.endpoint,
        settings_path: cli.read_settings,
    })
    .await?;

    println!("{}", output);
    Ok(())
}
