//! Property-based tests using proptest
//!
//! These tests check the page-window partitioning, property diffing, cable
//! key canonicalization and query-filter parsing over randomized inputs.

use nbsync::design::properties::DeviceField;
use nbsync::design::{DeviceProperties, Endpoint};
use nbsync::netbox::{page_windows, NetboxClient};
use nbsync::sync::cable_key;
use proptest::prelude::*;

/// Generate device property records from a small value alphabet so that
/// equal and unequal fields both show up often
fn arb_props() -> impl Strategy<Value = DeviceProperties> {
    let field = || prop_oneof!["", "a", "b", "hq", "active"].prop_map(String::from);
    (field(), field(), field(), field(), field(), field(), field()).prop_map(
        |(site, status, device_role, device_type, platform, product_model, primary_ip)| DeviceProperties {
            site,
            status,
            device_role,
            device_type,
            platform,
            product_model,
            primary_ip,
        },
    )
}

fn arb_endpoint() -> impl Strategy<Value = Endpoint> {
    ("[a-z][a-z0-9-]{0,8}", "[A-Za-z]+[0-9/]{0,4}").prop_map(|(d, i)| Endpoint::new(&d, &i))
}

proptest! {
    /// Windows are contiguous, non-overlapping and cover [0, total) exactly
    #[test]
    fn page_windows_partition_collection(total in 0usize..20_000, page_size in 1usize..2_000) {
        let windows = page_windows(total, page_size);
        prop_assert_eq!(windows.len(), total.div_ceil(page_size));

        let mut next = 0;
        for window in &windows {
            prop_assert_eq!(window.offset, next);
            prop_assert!(window.limit > 0 && window.limit <= page_size);
            next += window.limit;
        }
        prop_assert_eq!(next, total);
    }

    /// A - B and B - A name the same fields
    #[test]
    fn device_diff_is_symmetric(a in arb_props(), b in arb_props()) {
        prop_assert_eq!(&a - &b, &b - &a);
    }

    /// The diff is empty exactly when every field is equal
    #[test]
    fn device_diff_empty_iff_equal(a in arb_props(), b in arb_props()) {
        let diff = &a - &b;
        prop_assert_eq!(diff.is_empty(), a == b);
        for field in DeviceField::ALL {
            prop_assert_eq!(diff.contains(&field), a.get(field) != b.get(field));
        }
    }

    #[test]
    fn cable_key_is_order_independent(x in arb_endpoint(), y in arb_endpoint()) {
        let key = cable_key(&x, &y);
        prop_assert_eq!(&key, &cable_key(&y, &x));
        prop_assert!(key.a <= key.b);
    }

    /// Every well-formed keyword:value pair survives parsing
    #[test]
    fn qfilter_round_trips_pairs(pairs in prop::collection::btree_map("[a-z_]{1,12}", "[a-z0-9-]{1,12}", 0..6)) {
        let expr = pairs
            .iter()
            .map(|(k, v)| format!("{}:{}", k, v))
            .collect::<Vec<_>>()
            .join(",");
        let params = NetboxClient::parse_qfilter(&expr).unwrap();
        prop_assert_eq!(params.len(), pairs.len());
        for (k, v) in &pairs {
            prop_assert_eq!(params[k].as_str(), Some(v.as_str()));
        }
    }
}
