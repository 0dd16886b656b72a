//! Init command implementation
//!
//! Scaffolds a `lumen.toml`, `.env.example` and `.gitignore` for a new research
//! server.

use super::output::Output;
use std::fs;
use std::path::Path;

/// Result of the init operation
#[derive(Debug)]
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// Project already exists (lumen.toml found)
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: std::path::PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// LLM provider to configure (ollama or openai)
    pub provider: String,
    /// Host address for the server
    pub host: String,
    /// Port for the server
    pub port: u16,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing Lumen");

    let base_path = &config.path;
    if !base_path.exists() {
        if let Err(e) = fs::create_dir_all(base_path) {
            output.error(&format!("Failed to create {}: {}", base_path.display(), e));
            return InitResult::Error(e.to_string());
        }
    }

    let config_path = base_path.join("lumen.toml");
    if config_path.exists() && !config.force {
        output.warning("lumen.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    output.subheader("Creating configuration files");

    if let Err(e) = write_file(&config_path, &generate_lumen_toml(&config), config.force) {
        output.error(&format!("Failed to create lumen.toml: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", "lumen.toml");

    let env_example_path = base_path.join(".env.example");
    if env_example_path.exists() && !config.force {
        output.skipped(".env.example", "already exists");
    } else if let Err(e) = write_file(&env_example_path, &generate_env_example(), config.force) {
        output.error(&format!("Failed to create .env.example: {}", e));
        return InitResult::Error(e.to_string());
    } else {
        output.created("env", ".env.example");
    }

    let gitignore_path = base_path.join(".gitignore");
    if !gitignore_path.exists() {
        if let Err(e) = write_file(&gitignore_path, &generate_gitignore(), false) {
            output.warning(&format!("Failed to create .gitignore: {}", e));
        } else {
            output.created("file", ".gitignore");
        }
    }

    output.complete("Lumen initialized successfully!");

    output.header("Next Steps");
    output.newline();
    output.info("1. Set up search credentials (optional, DuckDuckGo and Wikipedia need none):");
    output.command("cp .env.example .env");
    output.newline();

    if config.provider == "ollama" {
        output.info("2. Start Ollama (if not running):");
        output.command("ollama serve");
        output.command("ollama pull qwen2.5:7b  # or your preferred model");
    } else {
        output.info("2. Set OPENAI_API_KEY in .env");
    }
    output.newline();

    output.info("3. Start the server, or run a one-off research session:");
    output.command("lumen-server serve");
    output.command("lumen-server research \"state of solid-state batteries\"");

    output.hint(&format!(
        "Server will be available at http://{}:{}",
        config.host, config.port
    ));

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(());
    }
    fs::write(path, content)
}

fn generate_lumen_toml(config: &InitConfig) -> String {
    let provider_section = if config.provider == "openai" {
        r#"# OpenAI or any compatible API (set OPENAI_API_KEY in .env)
[providers.openai]
type = "openai"
api_key_env = "OPENAI_API_KEY"
api_base = "https://api.openai.com/v1"
default_model = "gpt-4o-mini"

[models.default]
provider = "openai"
model = "gpt-4o-mini"
temperature = 0.3
"#
    } else {
        r#"# Local inference through Ollama
[providers.ollama-local]
type = "ollama"
base_url = "http://localhost:11434"
default_model = "qwen2.5:7b"

[models.default]
provider = "ollama-local"
model = "qwen2.5:7b"
temperature = 0.3
"#
    };

    format!(
        r#"# Lumen configuration
# Secrets are referenced by environment variable name and never stored here.

[server]
host = "{host}"
port = {port}
log_level = "info"
json_logs = false

{providers}
[research]
researcher_model = "default"
analyst_model = "default"
writer_model = "default"
# "auto" detects the language of each query; or fix one: en, zh, ja, ko, es, fr, de, ru
language = "auto"
initial_search_query_count = 3
max_research_loops = 2
results_per_query = 5
# session_timeout_secs = 600

[search]
# Tried in order; the first backend that returns results wins
backends = ["tavily", "serpapi", "google", "duckduckgo", "wikipedia"]
timeout_secs = 10
tavily_api_key_env = "TAVILY_API_KEY"
serpapi_api_key_env = "SERPAPI_API_KEY"
google_api_key_env = "GOOGLE_API_KEY"
google_cse_id_env = "GOOGLE_CSE_ID"
wikipedia_lang = "en"
# Full text of the top result pages is fetched for synthesis; 0 uses snippets only
fetch_pages = 3
page_timeout_secs = 8
page_max_chars = 4000
"#,
        host = config.host,
        port = config.port,
        providers = provider_section,
    )
}

fn generate_env_example() -> String {
    r#"# Lumen Environment Variables
# ===========================
# Copy this file to .env and fill in the values you need.

# Optional: Logging filter (overrides server.log_level)
RUST_LOG=info,lumen=debug

# Optional: OpenAI API key (if using the OpenAI provider)
# OPENAI_API_KEY=sk-...

# Optional: search backends (backends without credentials are skipped)
# TAVILY_API_KEY=tvly-...
# SERPAPI_API_KEY=...
# GOOGLE_API_KEY=...
# GOOGLE_CSE_ID=...
"#
    .to_string()
}

fn generate_gitignore() -> String {
    r#"# Environment
.env
.env.local
.env.*.local

# Rust
/target/

# IDE
.idea/
.vscode/
*.swp

# OS
.DS_Store
"#
    .to_string()
}
