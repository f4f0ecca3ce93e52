//! The chat page: document shell, informational layout and the sidebar
//! bootstrap read by `static/sidebar.js`.

use serde::Serialize;

/// Document-level metadata, set once per document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMetadata {
    pub title: &'static str,
    pub description: &'static str,
    pub lang: &'static str,
}

impl Default for PageMetadata {
    fn default() -> Self {
        Self {
            title: "AgentCore Local - AG-UI",
            description: "Local AgentCore Runtime with Strands Agent and CopilotKit",
            lang: "ja",
        }
    }
}

/// Where the sidebar sends runs, and which agent it addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeBinding {
    pub runtime_url: &'static str,
    pub agent: &'static str,
}

pub const RUNTIME_URL: &str = "/api/copilotkit";
pub use crate::agent::AGENT_NAME;

impl Default for RuntimeBinding {
    fn default() -> Self {
        Self {
            runtime_url: RUNTIME_URL,
            agent: AGENT_NAME,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidebarLabels {
    pub title: &'static str,
    pub initial: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SidebarOptions {
    pub default_open: bool,
    pub click_outside_to_close: bool,
    pub labels: SidebarLabels,
}

impl Default for SidebarOptions {
    fn default() -> Self {
        Self {
            default_open: true,
            click_outside_to_close: false,
            labels: SidebarLabels {
                title: "AgentCore Local",
                initial: "こんにちは！何かお手伝いできることはありますか？現在時刻を聞いてみてください。",
            },
        }
    }
}

/// Front-end build settings. Constant; no environment input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildConfig {
    pub server_external_packages: [&'static str; 3],
    pub turbopack: bool,
    pub react_strict_mode: bool,
    pub output: &'static str,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            server_external_packages: ["pino", "pino-pretty", "thread-stream"],
            turbopack: true,
            react_strict_mode: true,
            output: "standalone",
        }
    }
}

/// Everything `GET /api/config` reports.
#[derive(Debug, Clone, Serialize)]
pub struct PageConfig {
    pub metadata: PageMetadata,
    pub binding: RuntimeBinding,
    pub sidebar: SidebarOptions,
    pub build: BuildConfig,
    pub model: String,
}

/// Wrap `body` in the document shell.
pub fn render_document(metadata: &PageMetadata, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"{lang}\">\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n\
         <meta name=\"description\" content=\"{description}\">\n\
         <link rel=\"stylesheet\" href=\"/static/sidebar.css\">\n\
         </head>\n\
         <body>{body}</body>\n\
         </html>\n",
        lang = escape_html(metadata.lang),
        title = escape_html(metadata.title),
        description = escape_html(metadata.description),
    )
}

pub struct ChatPage {
    metadata: PageMetadata,
    binding: RuntimeBinding,
    sidebar: SidebarOptions,
    model: String,
}

impl ChatPage {
    /// `model` is shown in the technology list.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            metadata: PageMetadata::default(),
            binding: RuntimeBinding::default(),
            sidebar: SidebarOptions::default(),
            model: model.into(),
        }
    }

    pub fn config(&self) -> PageConfig {
        PageConfig {
            metadata: self.metadata.clone(),
            binding: self.binding.clone(),
            sidebar: self.sidebar.clone(),
            build: BuildConfig::default(),
            model: self.model.clone(),
        }
    }

    pub fn render(&self) -> String {
        let bootstrap = serde_json::json!({
            "binding": self.binding,
            "sidebar": self.sidebar,
        });
        let body = format!(
            "\n<main class=\"acl-main\">\n{content}</main>\n\
             <aside id=\"acl-sidebar\" class=\"acl-sidebar\"></aside>\n\
             <script type=\"application/json\" id=\"acl-binding\">{bootstrap}</script>\n\
             <script src=\"/static/sidebar.js\" defer></script>\n",
            content = self.render_content(),
            bootstrap = escape_script_json(&bootstrap.to_string()),
        );
        render_document(&self.metadata, &body)
    }

    fn render_content(&self) -> String {
        let tech = [
            ("Agent", "agentcore-local agent loop (Rust)".to_string()),
            ("LLM", format!("Ollama ({})", self.model)),
            ("Frontend", "sidebar.js + AG-UI".to_string()),
            ("Backend", "axum + AG-UI Protocol".to_string()),
        ];
        let items: String = tech
            .iter()
            .map(|(label, value)| {
                format!(
                    "<li><strong>{label}:</strong> {}</li>\n",
                    escape_html(value)
                )
            })
            .collect();

        format!(
            "<div class=\"acl-content\">\n\
             <h1>AgentCore Local</h1>\n\
             <p class=\"acl-subtitle\">Rust Agent + Ollama + AG-UI</p>\n\
             <section class=\"acl-stack\">\n\
             <h2>技術スタック</h2>\n\
             <ul>\n{items}</ul>\n\
             </section>\n\
             <section class=\"acl-usage\">\n\
             <h3>使い方</h3>\n\
             <p>右側のチャットパネルからエージェントと対話できます。</p>\n\
             <p class=\"acl-hint\">試しに「今何時ですか?」と聞いてみてください。エージェントがツールを使って正確な時刻を返します。</p>\n\
             </section>\n\
             </div>\n"
        )
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// JSON inside a `<script>` element must not contain `</`.
fn escape_script_json(json: &str) -> String {
    json.replace("</", "<\\/")
}
