use stackable_operator::{
    cpu::CpuQuantity, k8s_openapi::apimachinery::pkg::api::resource::Quantity,
    memory::MemoryQuantity,
};

use crate::crd::{ResourcesSpec, Tier};

/// Fully resolved requests and limits of a tier's main container
#[derive(Clone, Debug, PartialEq)]
pub struct ContainerResources {
    pub cpu_request: Quantity,
    pub cpu_limit: Quantity,
    pub memory_request: Quantity,
    pub memory_limit: Quantity,
}

/// Hard-coded fallbacks of a tier, as `(request, limit)` pairs
pub struct ResourceDefaults {
    pub cpu: (&'static str, &'static str),
    pub memory: (&'static str, &'static str),
}

/// Suffixes of the Kubernetes quantity grammar besides the `e<exponent>` notation
const BINARY_SI_SUFFIXES: [&str; 6] = ["Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];
const DECIMAL_SI_SUFFIXES: [&str; 10] = ["", "n", "u", "m", "k", "M", "G", "T", "P", "E"];

impl ContainerResources {
    pub fn resolve(tier: Tier, spec: &ResourcesSpec, defaults: &ResourceDefaults) -> Self {
        Self {
            cpu_request: cpu_or_default(
                tier,
                "requests",
                spec.requests.cpu.as_ref(),
                defaults.cpu.0,
            ),
            cpu_limit: cpu_or_default(tier, "limits", spec.limits.cpu.as_ref(), defaults.cpu.1),
            memory_request: memory_or_default(
                tier,
                "requests",
                spec.requests.memory.as_ref(),
                defaults.memory.0,
            ),
            memory_limit: memory_or_default(
                tier,
                "limits",
                spec.limits.memory.as_ref(),
                defaults.memory.1,
            ),
        }
    }
}

fn cpu_or_default(tier: Tier, field: &str, value: Option<&Quantity>, default: &str) -> Quantity {
    quantity_or_default(tier, "cpu", field, value, default, |quantity| {
        CpuQuantity::try_from(quantity).is_ok()
    })
}

fn memory_or_default(tier: Tier, field: &str, value: Option<&Quantity>, default: &str) -> Quantity {
    quantity_or_default(tier, "memory", field, value, default, |quantity| {
        MemoryQuantity::try_from(quantity).is_ok()
    })
}

/// Passes `value` through verbatim unless it is empty or not a Kubernetes quantity at all.
///
/// The stackable quantity types only understand a subset of the grammar (e.g. no `3G` memory),
/// so values they reject are checked against the full grammar before being replaced.
fn quantity_or_default(
    tier: Tier,
    resource: &str,
    field: &str,
    value: Option<&Quantity>,
    default: &str,
    parses: impl Fn(&Quantity) -> bool,
) -> Quantity {
    match value.filter(|quantity| !quantity.0.is_empty()) {
        Some(quantity) if parses(quantity) || is_kubernetes_quantity(&quantity.0) => {
            quantity.clone()
        }
        Some(quantity) => {
            tracing::warn!(
                %tier,
                resource,
                field,
                value = %quantity.0,
                default,
                "Invalid resource quantity, falling back to the default"
            );
            Quantity(default.to_string())
        }
        None => Quantity(default.to_string()),
    }
}

/// Checks `<signed number><suffix>` where the suffix is binary SI, decimal SI or `e<exponent>`
fn is_kubernetes_quantity(value: &str) -> bool {
    let unsigned = value.strip_prefix(['+', '-']).unwrap_or(value);
    let number_len = unsigned
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(unsigned.len());
    let (number, suffix) = unsigned.split_at(number_len);

    let valid_number =
        number.matches('.').count() <= 1 && number.chars().any(|c| c.is_ascii_digit());
    let valid_suffix = BINARY_SI_SUFFIXES.contains(&suffix)
        || DECIMAL_SI_SUFFIXES.contains(&suffix)
        || suffix.strip_prefix(['e', 'E']).is_some_and(|exponent| {
            let digits = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
            !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
        });
    valid_number && valid_suffix
}
