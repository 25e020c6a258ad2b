use strum::{Display, EnumIter};

/// The functional roles an `AxonOpsCassandra` is composed of.
///
/// The declaration order is the apply order: later tiers reference earlier tiers by their
/// deterministic object names.
#[derive(Clone, Copy, Debug, Display, EnumIter, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[strum(serialize_all = "kebab-case")]
pub enum Tier {
    SearchIndex,
    Dashboard,
    Server,
    Database,
}

impl Tier {
    pub const fn prefix(self) -> &'static str {
        match self {
            Tier::SearchIndex => "es",
            Tier::Dashboard => "ds",
            Tier::Server => "as",
            Tier::Database => "ca",
        }
    }

    /// Value of the `component` label on every object of this tier
    pub const fn component(self) -> &'static str {
        match self {
            Tier::SearchIndex => "elasticsearch",
            Tier::Dashboard => "dashboard",
            Tier::Server => "axon-server",
            Tier::Database => "cassandra",
        }
    }

    /// Returns the object name `<prefix>-<composite name>` shared by the workload and service
    /// (and ingress) of this tier.
    pub fn object_name(self, composite_name: &str) -> String {
        format!("{prefix}-{composite_name}", prefix = self.prefix())
    }
}

/// Returns the name of the optional headless database Service, `ca-<composite name>-headless`.
pub fn headless_service_name(composite_name: &str) -> String {
    format!("{}-headless", Tier::Database.object_name(composite_name))
}
