// ABOUTME: Diagnostics accumulator for non-fatal notices during a run.
// ABOUTME: Failures are never downgraded to these; they only flag risky but valid setups.

/// Collects non-fatal notices raised while preparing or finishing a run.
#[derive(Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn unchecked_freshness() -> Self {
        Self {
            kind: WarningKind::UncheckedFreshness,
            message: "no expected digest or max_age set; whatever the producer last published will be used".to_string(),
        }
    }

    pub fn unpinned_image(image: impl std::fmt::Display) -> Self {
        Self {
            kind: WarningKind::UnpinnedImage,
            message: format!("deploying {image} by tag; a reused tag may leave the function on older content"),
        }
    }

    pub fn orphaned_update(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::OrphanedUpdate,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// The consumer accepts any published document.
    UncheckedFreshness,
    /// The function is updated by mutable tag.
    UnpinnedImage,
    /// An update resource was detached with its external effect left in place.
    OrphanedUpdate,
}
