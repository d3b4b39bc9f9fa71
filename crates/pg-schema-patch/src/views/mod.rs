//! View recreation scripts with dependency ordering.
//!
//! Creation order comes from an externally maintained drop-views file: one
//! `DROP VIEW IF EXISTS <name>;` per line, listed in reverse-dependency
//! order for teardown. Reversing it yields a safe creation order. Views in
//! the diff that the file does not mention land in a separate unordered
//! bucket for manual review, since their dependency position is unknown.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::catalog::ViewMeta;
use crate::config::Conventions;

/// Matches the view name in a `DROP VIEW IF EXISTS <name>;` line.
static DROP_VIEW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)DROP\s+VIEW\s+IF\s+EXISTS\s+(\S+);")
        .unwrap_or_else(|e| panic!("invalid drop-view regex: {e}"))
});

/// Statement separator in rendered multi-view scripts.
const VIEW_SEPARATOR: &str =
    "\n\n--------------------------------------------------------------------------------\n\n";

/// Rendered view scripts, one bucket per output file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewScripts {
    /// Tenant-scoped views, in creation order.
    pub tenant_views: Option<String>,

    /// Ordinary views, in creation order.
    pub views: Option<String>,

    /// Views absent from the ordering file; position unknown.
    pub unordered_views: Option<String>,
}

/// Creation order extracted from the drop-views file, split per bucket.
#[derive(Debug, Clone, Default, PartialEq)]
struct ViewOrdering {
    tenant: Vec<String>,
    plain: Vec<String>,
}

/// Synthesizes CREATE OR REPLACE VIEW scripts.
pub struct ViewSynthesizer<'a> {
    conventions: &'a Conventions,
}

impl<'a> ViewSynthesizer<'a> {
    pub fn new(conventions: &'a Conventions) -> Self {
        Self { conventions }
    }

    /// Render scripts for the views named in `diff`, positioned by the
    /// ordering file. `all_views` supplies the fetched definitions.
    pub fn render(
        &self,
        all_views: &[ViewMeta],
        diff: &[String],
        order_file: Option<&str>,
    ) -> ViewScripts {
        let ordering = self.parse_order_file(order_file.unwrap_or(""));

        let mut tenant_slots: Vec<Option<&ViewMeta>> = vec![None; ordering.tenant.len()];
        let mut plain_slots: Vec<Option<&ViewMeta>> = vec![None; ordering.plain.len()];
        let mut unordered: Vec<&ViewMeta> = Vec::new();

        for name in diff {
            let Some(view) = all_views.iter().find(|v| &v.name == name) else {
                continue;
            };
            let (order, slots) = if self.conventions.is_tenant_view(name) {
                (&ordering.tenant, &mut tenant_slots)
            } else {
                (&ordering.plain, &mut plain_slots)
            };
            match order.iter().position(|n| n == name) {
                Some(pos) => slots[pos] = Some(view),
                None => unordered.push(view),
            }
        }

        ViewScripts {
            tenant_views: self.join_rendered(
                tenant_slots
                    .into_iter()
                    .flatten()
                    .map(|v| self.render_tenant_view(&v.name)),
            ),
            views: self.join_rendered(
                plain_slots
                    .into_iter()
                    .flatten()
                    .map(|v| render_plain_view(v)),
            ),
            unordered_views: self.join_rendered(unordered.into_iter().map(|v| {
                if self.conventions.is_tenant_view(&v.name) {
                    self.render_tenant_view(&v.name)
                } else {
                    render_plain_view(v)
                }
            })),
        }
    }

    /// Parse the drop-views file into per-bucket creation order (the drop
    /// order reversed).
    fn parse_order_file(&self, contents: &str) -> ViewOrdering {
        let mut ordering = ViewOrdering::default();
        for line in contents.lines() {
            let Some(name) = extract_view_name(line.trim()) else {
                continue;
            };
            if self.conventions.is_tenant_view(&name) {
                ordering.tenant.push(name);
            } else {
                ordering.plain.push(name);
            }
        }
        ordering.tenant.reverse();
        ordering.plain.reverse();
        ordering
    }

    /// Tenant view bodies ignore the fetched definition: they are always a
    /// tenant-filtered SELECT over the base table named by convention.
    fn render_tenant_view(&self, view_name: &str) -> String {
        let base = self.conventions.tenant_view_base(view_name);
        format!(
            "CREATE OR REPLACE VIEW {} \n AS SELECT * FROM {} WHERE {} = CAST(current_setting('{}') AS integer);",
            view_name, base, self.conventions.tenant_id_column, self.conventions.tenant_setting
        )
    }

    fn join_rendered(&self, rendered: impl Iterator<Item = String>) -> Option<String> {
        let parts: Vec<String> = rendered.collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(VIEW_SEPARATOR))
        }
    }
}

fn render_plain_view(view: &ViewMeta) -> String {
    format!("CREATE OR REPLACE VIEW {} \n AS {}", view.name, view.definition)
}

/// Extract the view name from one drop statement, if the line is one.
fn extract_view_name(line: &str) -> Option<String> {
    DROP_VIEW_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
