//! Prompt variable substitution and the clipboard boundary.

use log::warn;

use crate::prompt_model::{InsertPosition, Settings};

/// Literal placeholder replaced by the session variable.
pub const PLACEHOLDER: &str = "{{var}}";

/// Produces the final prompt text for `template` with `variable` applied.
///
/// - A blank variable (empty after trimming) leaves the template untouched.
/// - Every `{{var}}` occurrence is replaced with the variable as given.
/// - Without a placeholder the variable becomes a new leading or trailing
///   comma separated segment.
///
/// ```rust
/// use prompt_shelf::prompt_model::InsertPosition;
/// use prompt_shelf::template::render;
///
/// assert_eq!(render("a {{var}} b", "X", InsertPosition::Start), "a X b");
/// assert_eq!(render("masterpiece", "8k", InsertPosition::Start), "8k, masterpiece");
/// assert_eq!(render("masterpiece", "8k", InsertPosition::End), "masterpiece, 8k");
/// assert_eq!(render("masterpiece", "   ", InsertPosition::End), "masterpiece");
/// ```
pub fn render(template: &str, variable: &str, position: InsertPosition) -> String {
    if variable.trim().is_empty() {
        return template.to_string();
    }

    if template.contains(PLACEHOLDER) {
        return template.replace(PLACEHOLDER, variable);
    }

    match position {
        InsertPosition::Start => format!("{variable}, {template}"),
        InsertPosition::End => format!("{template}, {variable}"),
    }
}

/// Write-only access to the system clipboard.
pub trait Clipboard {
    /// Writes `text`. An `Err` carries a human readable reason.
    fn write_text(&mut self, text: &str) -> Result<(), String>;
}

impl<F> Clipboard for F
where
    F: FnMut(&str) -> Result<(), String>,
{
    fn write_text(&mut self, text: &str) -> Result<(), String> {
        self(text)
    }
}

/// Renders `template` against the current variable and settings and writes
/// the result to `clipboard`.
///
/// Returns `false` when the clipboard write fails; the failure is logged and
/// never propagated.
pub fn copy_prompt<C: Clipboard + ?Sized>(
    template: &str,
    variable: &str,
    settings: &Settings,
    clipboard: &mut C,
) -> bool {
    let text = render(template, variable, settings.auto_insert_position);
    match clipboard.write_text(&text) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to copy prompt to clipboard: {e}");
            false
        }
    }
}
