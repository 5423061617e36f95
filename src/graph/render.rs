//! Graph renderers: a self-contained vis-network HTML page and plain JSON.

use serde::Serialize;

use super::{Expansion, Graph};
use crate::error::{NewsgraphError, Result};
use crate::models::Sentiment;
use crate::report::{SentimentReport, NO_RELEVANT_HINT};

const VIS_NETWORK_URL: &str = "https://unpkg.com/vis-network@9.1.9/standalone/umd/vis-network.min.js";

/// Shown instead of the canvas when no relation was found
pub const SEED_ONLY_WARNING: &str =
    "Graph is empty or only the root node exists. Try a broader query or increase depth.";

pub trait GraphRenderer: Send + Sync {
    fn render(&self, graph: &Graph) -> Result<String>;

    /// MIME type of the rendered artifact
    fn content_type(&self) -> &'static str;
}

/// Edge colour for a sentiment label
pub fn edge_color(sentiment: Sentiment) -> &'static str {
    match sentiment {
        Sentiment::Positive => "green",
        Sentiment::Negative => "red",
        Sentiment::Neutral => "white",
    }
}

#[derive(Serialize)]
struct VisNode<'a> {
    id: &'a str,
    label: &'a str,
    title: String,
    color: &'static str,
    size: u32,
}

#[derive(Serialize)]
struct VisEdge {
    from: String,
    to: String,
    color: &'static str,
    title: String,
}

/// Interactive HTML page (dark theme, sentiment-coloured edges, indexed article list)
pub struct HtmlRenderer {
    pub height_px: u32,
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self { height_px: 700 }
    }
}

impl HtmlRenderer {
    fn vis_data(&self, graph: &Graph) -> Result<(String, String)> {
        let nodes: Vec<VisNode> = graph
            .nodes()
            .iter()
            .map(|node| {
                let (color, size) = if node.depth == 0 {
                    ("#1f78ff", 30)
                } else if graph.is_expanded(&node.key) {
                    ("#97c2fc", 18)
                } else {
                    ("#777777", 12)
                };
                VisNode {
                    id: &node.key,
                    label: &node.name,
                    title: format!("{} (depth {})", node.name, node.depth),
                    color,
                    size,
                }
            })
            .collect();

        let edges: Vec<VisEdge> = graph
            .edges()
            .iter()
            .map(|edge| VisEdge {
                from: super::normalize_name(&edge.source),
                to: super::normalize_name(&edge.target),
                color: edge_color(edge.sentiment),
                title: format!("[{}] {}", edge.article_index, edge.article_title),
            })
            .collect();

        Ok((script_json(&nodes)?, script_json(&edges)?))
    }
}

impl GraphRenderer for HtmlRenderer {
    fn render(&self, graph: &Graph) -> Result<String> {
        let seed = escape_html(graph.seed());
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>{} - Company Sentiment Graph</title>\n", seed));
        html.push_str(&format!("<script src=\"{}\"></script>\n", VIS_NETWORK_URL));
        html.push_str(&format!(
            "<style>body{{background:#111111;color:#ffffff;font-family:sans-serif;margin:0;padding:16px}}\
             #graph{{width:100%;height:{}px;border:1px solid #333333}}\
             .warning{{background:#5c4400;border:1px solid #c99700;padding:12px;border-radius:4px}}\
             a{{color:#97c2fc}}</style>\n</head>\n<body>\n",
            self.height_px
        ));
        html.push_str(&format!("<h1>Company Sentiment Graph: {}</h1>\n", seed));

        if graph.is_seed_only() {
            html.push_str(&format!("<div class=\"warning\">{}</div>\n", SEED_ONLY_WARNING));
        } else {
            let (nodes, edges) = self.vis_data(graph)?;
            html.push_str(&format!(
                "<p>{} companies, {} relations. Edge colour: green positive, red negative, white neutral.</p>\n",
                graph.node_count(),
                graph.edge_count()
            ));
            html.push_str("<div id=\"graph\"></div>\n<script>\n");
            html.push_str(&format!("const nodes = new vis.DataSet({});\n", nodes));
            html.push_str(&format!("const edges = new vis.DataSet({});\n", edges));
            html.push_str(
                "new vis.Network(document.getElementById(\"graph\"), {nodes: nodes, edges: edges}, \
                 {nodes: {shape: \"dot\", font: {color: \"#ffffff\"}}, \
                 interaction: {tooltipDelay: 200, hideEdgesOnDrag: true}, \
                 physics: {stabilization: true}});\n</script>\n",
            );

            let citations = graph.citations();
            html.push_str("<h2>News Articles (Indexed)</h2>\n<ul>\n");
            for citation in &citations {
                html.push_str(&format!(
                    "<li><strong>[{}]</strong> {} <em>({})</em></li>\n",
                    citation.article_index,
                    article_link(&citation.url, &citation.title),
                    escape_html(&citation.company)
                ));
            }
            html.push_str("</ul>\n");
        }

        html.push_str("</body>\n</html>\n");
        Ok(html)
    }

    fn content_type(&self) -> &'static str {
        "text/html; charset=utf-8"
    }
}

/// Pretty JSON of the graph plus its article citations
pub struct JsonRenderer;

impl GraphRenderer for JsonRenderer {
    fn render(&self, graph: &Graph) -> Result<String> {
        let expansion = Expansion::new(graph.clone());
        Ok(serde_json::to_string_pretty(&expansion)?)
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}

#[derive(Serialize)]
struct ReportNode<'a> {
    id: String,
    label: String,
    title: &'a str,
    color: &'static str,
    size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    href: Option<&'a str>,
}

/// Star graph of a sentiment report: the company in the centre, one node per
/// article, edges coloured by the article's sentiment. Clicking an article
/// node opens its link.
pub fn render_report_html(report: &SentimentReport) -> Result<String> {
    let company = escape_html(&report.company);
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{} - Stock Sentiment Graph</title>\n", company));
    html.push_str(&format!("<script src=\"{}\"></script>\n", VIS_NETWORK_URL));
    html.push_str(
        "<style>body{background:#222222;color:#ffffff;font-family:sans-serif;margin:0;padding:16px}\
         #graph{width:100%;height:600px;border:1px solid #333333}\
         .warning{background:#5c4400;border:1px solid #c99700;padding:12px;border-radius:4px}\
         a{color:#97c2fc}</style>\n</head>\n<body>\n",
    );
    html.push_str(&format!("<h1>Stock Sentiment Graph: {}</h1>\n", company));

    if report.is_empty() {
        html.push_str(&format!("<div class=\"warning\">{}</div>\n", NO_RELEVANT_HINT));
        html.push_str("</body>\n</html>\n");
        return Ok(html);
    }

    let mut nodes = vec![ReportNode {
        id: "center".to_string(),
        label: report.company.clone(),
        title: &report.company,
        color: "blue",
        size: 30,
        href: None,
    }];
    let mut edges = Vec::with_capacity(report.entries.len());
    for entry in &report.entries {
        let id = format!("news_{}", entry.index);
        nodes.push(ReportNode {
            id: id.clone(),
            label: entry.index.to_string(),
            title: &entry.title,
            color: "white",
            size: 12,
            href: safe_href(&entry.url),
        });
        edges.push(VisEdge {
            from: "center".to_string(),
            to: id,
            color: edge_color(entry.sentiment),
            title: format!("{} ({:.2})", entry.sentiment.as_str(), entry.confidence),
        });
    }

    html.push_str(&format!(
        "<p>{} articles: {} positive, {} negative, {} neutral.</p>\n",
        report.entries.len(),
        report.counts.positive,
        report.counts.negative,
        report.counts.neutral
    ));
    html.push_str("<div id=\"graph\"></div>\n<script>\n");
    html.push_str(&format!("const nodes = new vis.DataSet({});\n", script_json(&nodes)?));
    html.push_str(&format!("const edges = new vis.DataSet({});\n", script_json(&edges)?));
    html.push_str(
        "const network = new vis.Network(document.getElementById(\"graph\"), {nodes: nodes, edges: edges}, \
         {nodes: {shape: \"dot\", font: {color: \"#ffffff\", multi: true}}, \
         interaction: {tooltipDelay: 200, hideEdgesOnDrag: true}});\n\
         network.on(\"click\", function (params) {\n\
           if (params.nodes.length === 0) { return; }\n\
           const node = nodes.get(params.nodes[0]);\n\
           if (node.href) { window.open(node.href, \"_blank\", \"noopener\"); }\n\
         });\n</script>\n",
    );

    html.push_str("<h2>News Articles (Indexed)</h2>\n<ul>\n");
    for entry in &report.entries {
        html.push_str(&format!(
            "<li><strong>[{}]</strong> {} <em>({})</em></li>\n",
            entry.index,
            article_link(&entry.url, &entry.title),
            entry.sentiment.as_str()
        ));
    }
    html.push_str("</ul>\n</body>\n</html>\n");
    Ok(html)
}

/// The url itself when it is an http(s) link, otherwise None
fn safe_href(url: &str) -> Option<&str> {
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Some(url),
        _ => None,
    }
}

/// Anchor for a safe url, plain escaped title otherwise
fn article_link(url: &str, title: &str) -> String {
    match safe_href(url) {
        Some(href) => format!("<a href=\"{}\">{}</a>", escape_html(href), escape_html(title)),
        None => escape_html(title),
    }
}

/// JSON safe to embed inside a `<script>` element
fn script_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map(|s| s.replace("</", "<\\/"))
        .map_err(|e| NewsgraphError::Render(format!("Failed to encode graph data: {}", e)))
}

pub(crate) fn escape_html(s: &str) -> String {
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
