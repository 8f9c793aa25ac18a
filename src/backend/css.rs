//! Style-property backend. The unconditional fallback: it must never
//! fail, so a missing node is still reported as success (the node is
//! simply gone, there is nothing to correct).

use std::time::Instant;

use super::{ApplyOutcome, RenderBackend, RenderMetrics};
use crate::compose::VisualTransformDescriptor;
use crate::document::{Document, NodeId};

#[derive(Debug, Clone, Default)]
pub struct CssBackend;

impl CssBackend {
    pub fn new() -> Self {
        Self
    }
}

impl RenderBackend for CssBackend {
    fn name(&self) -> &'static str {
        "css"
    }

    fn apply(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        descriptor: &VisualTransformDescriptor,
    ) -> ApplyOutcome {
        let started = Instant::now();

        if let Some(target) = doc.get_mut(node) {
            let filter = descriptor.to_filter_string();
            if filter.is_empty() {
                target.set_style("filter", "none");
            } else {
                target.set_style("filter", &filter);
            }

            if let Some(typography) = &descriptor.typography {
                target.set_style(
                    "letter-spacing",
                    &format!("{:.3}em", typography.letter_spacing_em),
                );
                target.set_style("line-height", &format!("{:.2}", typography.line_height));
                target.set_style("font-weight", &typography.font_weight.to_string());
            }
        }

        ApplyOutcome::success(RenderMetrics::timed(
            started.elapsed().as_secs_f64() * 1000.0,
        ))
    }
}
