use std::net::{IpAddr, Ipv4Addr};

use if_addrs::{IfAddr, Interface};

const VIRTUAL_PREFIXES: &[&str] = &["docker", "veth", "br-", "virbr", "vmnet", "vboxnet"];

/// Falls back to the limited broadcast address when no interface qualifies.
pub fn broadcast_targets() -> Vec<IpAddr> {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            log::debug!("Interface enumeration failed: {}", e);
            Vec::new()
        }
    };

    let targets = collect_targets(&interfaces);
    if targets.is_empty() {
        vec![IpAddr::V4(Ipv4Addr::BROADCAST)]
    } else {
        targets
    }
}

fn collect_targets(interfaces: &[Interface]) -> Vec<IpAddr> {
    let mut targets = Vec::new();

    for interface in interfaces {
        if interface.is_loopback() || is_virtual(&interface.name) {
            continue;
        }

        let IfAddr::V4(v4) = &interface.addr else {
            continue;
        };

        // Link-local addresses are what an interface without a lease reports.
        if v4.ip.is_unspecified() || v4.ip.is_link_local() {
            continue;
        }

        if let Some(broadcast) = v4.broadcast {
            let target = IpAddr::V4(broadcast);
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }

    targets
}

fn is_virtual(name: &str) -> bool {
    name.contains(':') || VIRTUAL_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}
