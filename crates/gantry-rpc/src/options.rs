//! Options that describe what an endpoint can represent on the wire.

/// Per-call configuration for [`marshal_value`](crate::marshal_value) and
/// [`unmarshal_value`](crate::unmarshal_value).
///
/// The same options are passed to both directions of a call so that encode
/// and decode apply identical filters. The default keeps nothing rich: every
/// unknown is dropped, secrets and outputs collapse to plain values, and
/// resource references collapse to their ID or URN.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "each flag is an independent wire capability"
)]
pub struct MarshalOptions {
    /// Encode unknowns as sentinel strings instead of dropping them.
    pub keep_unknowns: bool,
    /// Fail on any unknown. Takes precedence over `keep_unknowns`.
    pub reject_unknowns: bool,
    /// Preserve secrets as signature-tagged objects.
    pub keep_secrets: bool,
    /// Preserve resource references as signature-tagged objects.
    pub keep_resources: bool,
    /// Preserve outputs as signature-tagged objects.
    pub keep_output_values: bool,
    /// Omit null-valued object fields.
    pub skip_nulls: bool,
    /// Omit object fields whose keys are internal.
    pub skip_internal_keys: bool,
    /// Fail on any asset or archive.
    pub reject_assets: bool,
    /// Encode assets and archives by hash only.
    pub elide_asset_contents: bool,
    /// Compute missing asset and archive hashes.
    pub compute_asset_hashes: bool,
    /// Tag attached to log messages. Has no behavioural effect.
    pub label: String,
}

impl MarshalOptions {
    /// Options with every rich wire capability enabled.
    #[must_use]
    pub fn keep_all() -> Self {
        Self {
            keep_unknowns: true,
            keep_secrets: true,
            keep_resources: true,
            keep_output_values: true,
            ..Self::default()
        }
    }

    /// Sets the log label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets `keep_unknowns`.
    #[must_use]
    pub const fn keep_unknowns(mut self, keep: bool) -> Self {
        self.keep_unknowns = keep;
        self
    }

    /// Sets `reject_unknowns`.
    #[must_use]
    pub const fn reject_unknowns(mut self, reject: bool) -> Self {
        self.reject_unknowns = reject;
        self
    }

    /// Sets `keep_secrets`.
    #[must_use]
    pub const fn keep_secrets(mut self, keep: bool) -> Self {
        self.keep_secrets = keep;
        self
    }

    /// Sets `keep_resources`.
    #[must_use]
    pub const fn keep_resources(mut self, keep: bool) -> Self {
        self.keep_resources = keep;
        self
    }

    /// Sets `keep_output_values`.
    #[must_use]
    pub const fn keep_output_values(mut self, keep: bool) -> Self {
        self.keep_output_values = keep;
        self
    }

    /// Sets `skip_nulls`.
    #[must_use]
    pub const fn skip_nulls(mut self, skip: bool) -> Self {
        self.skip_nulls = skip;
        self
    }

    /// Sets `skip_internal_keys`.
    #[must_use]
    pub const fn skip_internal_keys(mut self, skip: bool) -> Self {
        self.skip_internal_keys = skip;
        self
    }

    /// Sets `reject_assets`.
    #[must_use]
    pub const fn reject_assets(mut self, reject: bool) -> Self {
        self.reject_assets = reject;
        self
    }

    /// Sets `elide_asset_contents`.
    #[must_use]
    pub const fn elide_asset_contents(mut self, elide: bool) -> Self {
        self.elide_asset_contents = elide;
        self
    }

    /// Sets `compute_asset_hashes`.
    #[must_use]
    pub const fn compute_asset_hashes(mut self, compute: bool) -> Self {
        self.compute_asset_hashes = compute;
        self
    }
}
