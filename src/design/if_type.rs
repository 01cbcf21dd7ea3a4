//! Mapping from design interfaces to NetBox interface `type` slugs

use super::model::{FormFactor, Interface, InterfaceKind, PhyPort};
use super::model::speed::*;

const IF_TYPE_MAP: &[(FormFactor, u32, &str)] = &[
    (FormFactor::Rj45, M100, "100base-tx"),
    (FormFactor::Rj45, G1, "1000base-t"),
    (FormFactor::Rj45, G2_5, "2.5gbase-t"),
    (FormFactor::Rj45, G5, "5gbase-t"),
    (FormFactor::Rj45, G10, "10gbase-t"),
    (FormFactor::Sfp, G1, "1000base-x-sfp"),
    (FormFactor::Sfpp, G10, "10gbase-x-sfpp"),
    (FormFactor::Sfp28, G10, "10gbase-x-sfpp"),
    (FormFactor::Sfp28, G25, "25gbase-x-sfp28"),
    (FormFactor::Sfp28, G50, "50gbase-x-sfp28"),
    (FormFactor::Qsfpp, G40, "40gbase-x-qsfpp"),
    (FormFactor::Qsfp28, G100, "100gbase-x-qsfp28"),
];

pub const IF_TYPE_LAG: &str = "lag";
pub const IF_TYPE_VIRTUAL: &str = "virtual";
pub const IF_TYPE_OTHER: &str = "other";

/// Table lookup for a physical port
pub fn phy_port_type(port: &PhyPort) -> Option<&'static str> {
    IF_TYPE_MAP
        .iter()
        .find(|(ff, speed, _)| *ff == port.form_factor && *speed == port.speed)
        .map(|(_, _, if_type)| *if_type)
}

/// NetBox interface type for `iface` on device `dev_name`
///
/// Unused interfaces are typed by their hardware port. Used interfaces are
/// typed by profile: LAGs are `lag`, loopback and virtual interfaces are
/// `virtual`, physical ones use the profile's phy settings, falling back to
/// the hardware port. Anything unmapped becomes `other`.
pub fn netbox_interface_type(dev_name: &str, iface: &Interface) -> &'static str {
    let Some(profile) = &iface.profile else {
        return lookup_or_other(dev_name, &iface.name, iface.port.as_ref());
    };

    match profile.kind {
        InterfaceKind::Lag { .. } => IF_TYPE_LAG,
        InterfaceKind::Loopback | InterfaceKind::Virtual => IF_TYPE_VIRTUAL,
        InterfaceKind::Physical => {
            let port = profile.phy.as_ref().or(iface.port.as_ref());
            if port.is_none() {
                tracing::error!(
                    "{}:{}: profile {} missing form-factor information, using \"other\"",
                    dev_name,
                    iface.name,
                    profile.name
                );
                return IF_TYPE_OTHER;
            }
            lookup_or_other(dev_name, &iface.name, port)
        }
    }
}

fn lookup_or_other(dev_name: &str, if_name: &str, port: Option<&PhyPort>) -> &'static str {
    if let Some(if_type) = port.and_then(phy_port_type) {
        return if_type;
    }
    tracing::warn!(
        "{}:{}: unknown NetBox interface type for {:?}, default = \"other\"",
        dev_name,
        if_name,
        port
    );
    IF_TYPE_OTHER
}
