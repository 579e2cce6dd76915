#[cfg(feature = "cli")]
mod real {
    use clap::Parser;
    use contacts_core::{
        ContactSource, ErrorKind, InlineSource, ParseResponse, ParserConfig, PathSource,
        UploadSource, logger, parse_source,
    };
    use std::io::Read;
    use std::path::PathBuf;

    /// Parse a contacts XML document and print the JSON response.
    #[derive(Debug, Parser)]
    #[command(name = "contacts-parse")]
    #[command(about = "Parse a contacts XML document and print the JSON response")]
    struct Cli {
        /// Read the document from a local file path.
        #[arg(long, conflicts_with_all = ["upload", "inline"])]
        path: Option<PathBuf>,

        /// Treat the file as an uploaded payload (its name is echoed back).
        #[arg(long, conflicts_with = "inline")]
        upload: Option<PathBuf>,

        /// XML text given directly on the command line. Without any source
        /// flag the document is read from stdin.
        #[arg(long)]
        inline: Option<String>,

        /// TOML file with parser settings.
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        max_depth: Option<usize>,

        #[arg(long)]
        max_field_length: Option<usize>,

        #[arg(long)]
        pretty: bool,

        #[arg(short, long)]
        verbose: bool,
    }

    const EXIT_PARSE_FAILED: i32 = 1;
    const EXIT_SOURCE_UNAVAILABLE: i32 = 2;
    const EXIT_BAD_CONFIG: i32 = 3;

    fn load_config(cli: &Cli) -> Result<ParserConfig, contacts_core::ConfigError> {
        let mut config = match &cli.config {
            Some(path) => ParserConfig::from_toml_file(path)?,
            None => ParserConfig::default(),
        };
        if let Some(max_depth) = cli.max_depth {
            config = config.with_max_depth(max_depth);
        }
        if let Some(max_field_length) = cli.max_field_length {
            config = config.with_max_field_length(max_field_length);
        }
        config.validate()?;
        Ok(config)
    }

    fn build_source(cli: &Cli) -> Result<Box<dyn ContactSource>, String> {
        if let Some(path) = &cli.path {
            return Ok(Box::new(PathSource::new(path.clone())));
        }
        if let Some(path) = &cli.upload {
            let payload = std::fs::read(path)
                .map_err(|err| format!("Cannot read upload {}: {err}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
            return Ok(Box::new(UploadSource::new(file_name, payload)));
        }
        if let Some(text) = &cli.inline {
            return Ok(Box::new(InlineSource::new(text.clone())));
        }
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|err| format!("Cannot read stdin: {err}"))?;
        Ok(Box::new(InlineSource::new(text)))
    }

    fn print(response: &ParseResponse, pretty: bool) {
        let rendered = if pretty {
            response.to_json_pretty()
        } else {
            response.to_json()
        };
        match rendered {
            Ok(json) => println!("{json}"),
            Err(err) => eprintln!("error: cannot serialize response: {err}"),
        }
    }

    pub fn main() {
        let cli = Cli::parse();
        logger::init_cli_logger(cli.verbose);

        let config = match load_config(&cli) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!("configuration rejected: {err}");
                eprintln!("error: {err}");
                std::process::exit(EXIT_BAD_CONFIG);
            }
        };
        tracing::debug!(?config, "parser configuration");

        let source = match build_source(&cli) {
            Ok(source) => source,
            Err(message) => {
                let response = ParseResponse::failure(
                    &contacts_core::ParseError::SourceUnavailable(message),
                );
                print(&response, cli.pretty);
                std::process::exit(EXIT_SOURCE_UNAVAILABLE);
            }
        };

        let response = parse_source(source.as_ref(), &config);
        print(&response, cli.pretty);

        if !response.success {
            let exit_code = match response.error_type.as_deref() {
                Some(code) if code == ErrorKind::SourceUnavailable.code() => {
                    EXIT_SOURCE_UNAVAILABLE
                }
                _ => EXIT_PARSE_FAILED,
            };
            std::process::exit(exit_code);
        }
    }
}

#[cfg(feature = "cli")]
fn main() {
    real::main();
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("contacts-parse requires `--features cli`");
    std::process::exit(2);
}
