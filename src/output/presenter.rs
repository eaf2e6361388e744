use std::io::{self, Write};

use serde_json::Value;

use super::config::{OutputConfig, OutputFormat};
use super::types::Envelope;

pub trait Presenter: Send + Sync {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()>;
}

pub struct JsonPresenter { pub pretty: bool }
impl Presenter for JsonPresenter {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        if self.pretty { serde_json::to_writer_pretty(&mut *w, env).map_err(to_io)? } else { serde_json::to_writer(&mut *w, env).map_err(to_io)? }
        writeln!(w)
    }
}

/// Human-readable summary: one line per top-level field (arrays and objects
/// as counts), or the full payload when `pretty` is set.
pub struct TextPresenter { pub pretty: bool }
impl Presenter for TextPresenter {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "{}: {}", env.label(), env.op)?;
        let body = env.payload();
        if self.pretty {
            serde_json::to_writer_pretty(&mut *w, body).map_err(to_io)?;
            return writeln!(w);
        }
        if let Value::Object(map) = body {
            for (k, v) in map {
                match v {
                    Value::String(s) => writeln!(w, "  {}: {}", k, s)?,
                    Value::Number(_) | Value::Bool(_) => writeln!(w, "  {}: {}", k, v)?,
                    Value::Array(items) => writeln!(w, "  {}: [{} item(s)]", k, items.len())?,
                    Value::Object(inner) => writeln!(w, "  {}: {{{} field(s)}}", k, inner.len())?,
                    Value::Null => {}
                }
            }
        }
        if let Some(ms) = env.elapsed_ms {
            writeln!(w, "  elapsed: {} ms", ms)?;
        }
        Ok(())
    }
}

pub struct Emitter {
    presenter: Box<dyn Presenter>,
}

impl Emitter {
    pub fn from_env(cfg: OutputConfig) -> Self {
        let presenter: Box<dyn Presenter> = match cfg.format {
            OutputFormat::Json => Box::new(JsonPresenter { pretty: cfg.pretty }),
            OutputFormat::Text => Box::new(TextPresenter { pretty: cfg.pretty }),
        };
        Emitter { presenter }
    }

    pub fn emit(&self, env: &Envelope) -> io::Result<()> {
        let mut out = io::stdout().lock();
        self.presenter.emit(env, &mut out)?;
        out.flush()
    }
}

fn to_io(e: serde_json::Error) -> io::Error { io::Error::other(e) }

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(p: &dyn Presenter, env: &Envelope) -> String {
        let mut buf = Vec::new();
        p.emit(env, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn json_presenter_writes_one_line() {
        let env = Envelope::result("ask", &json!({"answer": "42"}), None).unwrap();
        let s = render(&JsonPresenter { pretty: false }, &env);
        assert_eq!(s.lines().count(), 1);
        let v: Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["op"], "ask");
        assert_eq!(v["result"]["answer"], "42");
    }

    #[test]
    fn text_presenter_lists_scalars() {
        let env = Envelope::plan("delete", &json!({"all": true, "ids": ["a", "b"], "store": "memory"})).unwrap();
        let s = render(&TextPresenter { pretty: false }, &env);
        assert!(s.starts_with("Plan: delete\n"));
        assert!(s.contains("  all: true\n"));
        assert!(s.contains("  ids: [2 item(s)]\n"));
        assert!(s.contains("  store: memory\n"));
        assert!(!s.contains("elapsed"));
    }

    #[test]
    fn text_presenter_shows_nested_counts_and_elapsed() {
        let body = json!({"effective": {"chunk_size": 1000, "chunk_overlap": 200}, "source": "a.pdf"});
        let env = Envelope::result("chunk", &body, Some(std::time::Duration::from_millis(7))).unwrap();
        let s = render(&TextPresenter { pretty: false }, &env);
        assert!(s.starts_with("Result: chunk\n"));
        assert!(s.contains("  effective: {2 field(s)}\n"));
        assert!(s.ends_with("  elapsed: 7 ms\n"));
    }
}
