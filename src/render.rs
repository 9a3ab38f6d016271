use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use crate::dot;
use crate::graph::PlanGraph;

/// Image (or source) format handed to Graphviz.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Png,
    Svg,
    Pdf,
    /// DOT source only; Graphviz is not invoked.
    #[value(alias = "gv")]
    Dot,
}

impl OutputFormat {
    /// Value passed to `dot -T`.
    pub fn dot_flag(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Dot => "dot",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Dot => "gv",
            other => other.dot_flag(),
        }
    }
}

/// Turns a DOT source file into an image.
pub trait Renderer {
    fn render(&self, source: &Path, format: OutputFormat, output: &Path) -> Result<()>;
}

/// Renderer backed by the Graphviz `dot` executable.
#[derive(Debug, Clone)]
pub struct GraphvizRenderer {
    pub bin: PathBuf,
}

impl GraphvizRenderer {
    /// Use `FLOWCHART_DOT_BIN` when set, otherwise `dot` on PATH.
    pub fn from_env() -> Self {
        Self { bin: dot_bin() }
    }
}

impl Default for GraphvizRenderer {
    fn default() -> Self {
        Self::from_env()
    }
}

impl Renderer for GraphvizRenderer {
    fn render(&self, source: &Path, format: OutputFormat, output: &Path) -> Result<()> {
        debug!(
            bin = %self.bin.display(),
            source = %source.display(),
            output = %output.display(),
            "Invoking Graphviz"
        );

        let out = Command::new(&self.bin)
            .arg(format!("-T{}", format.dot_flag()))
            .arg("-o")
            .arg(output)
            .arg(source)
            .output()
            .with_context(|| {
                format!(
                    "failed to spawn `{}` (is Graphviz installed and on PATH? \
                     set FLOWCHART_DOT_BIN to point at the dot binary)",
                    self.bin.display()
                )
            })?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(anyhow!(
                "graphviz exited with {}: {}",
                out.status,
                stderr.trim()
            ));
        }
        Ok(())
    }
}

fn dot_bin() -> PathBuf {
    env::var_os("FLOWCHART_DOT_BIN")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("dot"))
}

/// Write `<out_dir>/<name>.gv` and, unless `format` is DOT, render it to
/// `<out_dir>/<name>.<ext>`. Returns the path of the final artifact.
pub fn render_graph(
    graph: &PlanGraph,
    out_dir: &Path,
    format: OutputFormat,
    renderer: &dyn Renderer,
) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output dir {}", out_dir.display()))?;

    let source = out_dir.join(format!("{}.gv", graph.name));
    fs::write(&source, dot::to_dot(graph))
        .with_context(|| format!("failed to write {}", source.display()))?;
    info!(
        source = %source.display(),
        digest = %dot::graph_digest(graph),
        "Wrote graph source"
    );

    if format == OutputFormat::Dot {
        return Ok(source);
    }

    let output = out_dir.join(format!("{}.{}", graph.name, format.extension()));
    renderer
        .render(&source, format, &output)
        .with_context(|| format!("failed to render {}", output.display()))?;
    info!(output = %output.display(), "Rendered graph");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Action, Plan};
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingRenderer {
        calls: RefCell<Vec<(PathBuf, OutputFormat, PathBuf)>>,
    }

    impl Renderer for RecordingRenderer {
        fn render(&self, source: &Path, format: OutputFormat, output: &Path) -> Result<()> {
            self.calls
                .borrow_mut()
                .push((source.to_path_buf(), format, output.to_path_buf()));
            fs::write(output, b"fake image")?;
            Ok(())
        }
    }

    struct FailingRenderer;

    impl Renderer for FailingRenderer {
        fn render(&self, _: &Path, _: OutputFormat, _: &Path) -> Result<()> {
            Err(anyhow!("renderer unavailable"))
        }
    }

    fn tmp_dir(tag: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!(
            "plan-flowchart-render-{tag}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn graph() -> PlanGraph {
        let plan = Plan::new(
            "two_step",
            vec![],
            vec![Action::new("A", vec![]), Action::new("B", vec![0])],
        );
        PlanGraph::from_plan(&plan).expect("build")
    }

    #[test]
    fn png_render_writes_source_then_invokes_renderer() {
        let dir = tmp_dir("png");
        let r = RecordingRenderer::default();
        let out = render_graph(&graph(), &dir, OutputFormat::Png, &r).expect("render");

        assert_eq!(out, dir.join("two_step.png"));
        assert!(out.is_file());
        let source = dir.join("two_step.gv");
        let text = fs::read_to_string(&source).expect("source written");
        assert!(text.starts_with("digraph \"two_step\" {"));

        let calls = r.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (source, OutputFormat::Png, out.clone()));
    }

    #[test]
    fn dot_format_skips_renderer() {
        let dir = tmp_dir("dot");
        let out = render_graph(&graph(), &dir, OutputFormat::Dot, &FailingRenderer)
            .expect("dot output needs no renderer");
        assert_eq!(out, dir.join("two_step.gv"));
    }

    #[test]
    fn renderer_failure_is_reported_with_output_path() {
        let dir = tmp_dir("fail");
        let err = render_graph(&graph(), &dir, OutputFormat::Svg, &FailingRenderer).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("failed to render"), "{msg}");
        assert!(msg.contains("two_step.svg"), "{msg}");
        assert!(msg.contains("renderer unavailable"), "{msg}");
    }

    #[test]
    fn missing_graphviz_binary_mentions_install_hint() {
        let dir = tmp_dir("missing-bin");
        let r = GraphvizRenderer {
            bin: PathBuf::from("/nonexistent/plan-flowchart/dot"),
        };
        let err = render_graph(&graph(), &dir, OutputFormat::Png, &r).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("is Graphviz installed"), "{msg}");
    }

    #[test]
    fn extensions_follow_format() {
        assert_eq!(OutputFormat::Png.extension(), "png");
        assert_eq!(OutputFormat::Dot.extension(), "gv");
        assert_eq!(OutputFormat::Dot.dot_flag(), "dot");
    }
}
