//! Step rendering: resolve a step's callback chain

use super::{Context, EngineError, EngineResult};
use crate::model::Step;

/// Default cap on callback passes for one message
pub const DEFAULT_MAX_RENDER_PASSES: usize = 32;

/// Run the step's callback, merge what it returns, and repeat while the
/// merged step still carries a callback
///
/// Passes are counted on the context across every step rendered for the
/// current message, including steps entered by navigation from inside a
/// callback. Once `ctx.max_render_passes` is spent, rendering fails with
/// [`EngineError::RenderLimit`].
pub(crate) async fn render_step(mut step: Step, ctx: &mut Context) -> EngineResult<Step> {
    let mut passes = 0;

    while let Some(callback) = step.callback.take() {
        if ctx.render_passes >= ctx.max_render_passes {
            tracing::warn!(
                conv_id = %ctx.conversation_id,
                step = %step.id,
                passes = ctx.render_passes,
                "Render callback chain did not settle"
            );
            return Err(EngineError::RenderLimit {
                step: step.id,
                passes: ctx.render_passes,
            });
        }
        ctx.render_passes += 1;
        passes += 1;

        if let Some(overlay) = callback.call(ctx).await? {
            step.apply(overlay);
        }
    }

    if passes > 0 {
        tracing::trace!(step = %step.id, passes, "Rendered step");
    }

    Ok(step)
}
