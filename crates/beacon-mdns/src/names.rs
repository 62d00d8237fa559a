//! Construction and matching of fully-qualified `.local.` names.
//!
//! Service names have the form `_name._tcp` or `_name._udp`. Full names are
//! always returned with a trailing dot. Comparisons ignore ASCII case and a
//! trailing dot, so `_http._tcp.local` matches `_http._tcp.local.`.

/// The mDNS domain.
pub const LOCAL_DOMAIN: &str = "local.";

/// Name queried to enumerate the service types on a link (RFC 6763 section 9).
pub const SERVICE_TYPE_ENUMERATION_NAME: &str = "_services._dns-sd._udp.local.";

const SUBTYPE_SEPARATOR: &str = "._sub.";
const MAX_LABEL_LENGTH: usize = 63;

pub fn local_host_full_name(host_name: &str) -> String {
    format!("{}.{}", host_name, LOCAL_DOMAIN)
}

pub fn local_service_full_name(service_name: &str) -> String {
    format!("{}.{}", service_name, LOCAL_DOMAIN)
}

pub fn local_instance_full_name(instance_name: &str, service_name: &str) -> String {
    format!("{}.{}.{}", instance_name, service_name, LOCAL_DOMAIN)
}

pub fn local_service_subtype_full_name(service_name: &str, subtype: &str) -> String {
    format!("{}{}{}.{}", subtype, SUBTYPE_SEPARATOR, service_name, LOCAL_DOMAIN)
}

/// Compares two domain names, ignoring ASCII case and a trailing dot.
pub fn names_equal(a: &str, b: &str) -> bool {
    a.trim_end_matches('.')
        .eq_ignore_ascii_case(b.trim_end_matches('.'))
}

/// Matches a queried name against a service.
///
/// Returns `Some("")` when `name` is the service's full name,
/// `Some(subtype)` when it is `<subtype>._sub.<service>.local.`, and `None`
/// otherwise.
pub fn match_service_name(name: &str, service_name: &str) -> Option<String> {
    let service_full_name = local_service_full_name(service_name);
    if names_equal(name, &service_full_name) {
        return Some(String::new());
    }

    let name = name.trim_end_matches('.');
    let suffix = format!("{}{}", SUBTYPE_SEPARATOR, service_full_name.trim_end_matches('.'));
    if name.len() <= suffix.len() {
        return None;
    }

    let split = name.len() - suffix.len();
    if !name.is_char_boundary(split) || !name[split..].eq_ignore_ascii_case(&suffix) {
        return None;
    }

    Some(name[..split].to_string())
}

pub fn is_valid_host_name(host_name: &str) -> bool {
    is_valid_label(host_name)
        && host_name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        && !host_name.starts_with('-')
        && !host_name.ends_with('-')
}

/// Checks for `_name._tcp` or `_name._udp`.
pub fn is_valid_service_name(service_name: &str) -> bool {
    let Some((name, protocol)) = service_name.split_once('.') else {
        return false;
    };
    if protocol != "_tcp" && protocol != "_udp" {
        return false;
    }
    let Some(label) = name.strip_prefix('_') else {
        return false;
    };
    // RFC 6335: at most 15 characters, letters, digits and hyphens
    !label.is_empty()
        && label.len() <= 15
        && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

pub fn is_valid_instance_name(instance_name: &str) -> bool {
    is_valid_label(instance_name)
}

pub fn is_valid_subtype_name(subtype: &str) -> bool {
    is_valid_label(subtype) && !subtype.contains('.')
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty() && label.len() <= MAX_LABEL_LENGTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_names() {
        assert_eq!(local_host_full_name("myhost"), "myhost.local.");
        assert_eq!(local_service_full_name("_http._tcp"), "_http._tcp.local.");
        assert_eq!(
            local_instance_full_name("My Server", "_http._tcp"),
            "My Server._http._tcp.local."
        );
        assert_eq!(
            local_service_subtype_full_name("_http._tcp", "_printer"),
            "_printer._sub._http._tcp.local."
        );
    }

    #[test]
    fn test_match_service_name() {
        assert_eq!(
            match_service_name("_svc._tcp.local", "_svc._tcp"),
            Some(String::new())
        );
        assert_eq!(
            match_service_name("_SVC._tcp.local.", "_svc._tcp"),
            Some(String::new())
        );
        assert_eq!(
            match_service_name("_color._sub._svc._tcp.local.", "_svc._tcp"),
            Some("_color".to_string())
        );
        assert_eq!(match_service_name("_other._tcp.local.", "_svc._tcp"), None);
        assert_eq!(match_service_name("._sub._svc._tcp.local.", "_svc._tcp"), None);
    }

    #[test]
    fn test_names_equal() {
        assert!(names_equal("MyHost.local.", "myhost.local"));
        assert!(!names_equal("myhost.local.", "otherhost.local."));
    }

    #[test]
    fn test_service_name_validation() {
        assert!(is_valid_service_name("_http._tcp"));
        assert!(is_valid_service_name("_airplay-2._udp"));
        assert!(!is_valid_service_name("http._tcp"));
        assert!(!is_valid_service_name("_http._sctp"));
        assert!(!is_valid_service_name("_http"));
        assert!(!is_valid_service_name("_._tcp"));
        assert!(!is_valid_service_name("_averyveryverylongname._tcp"));
    }

    #[test]
    fn test_host_and_instance_validation() {
        assert!(is_valid_host_name("myhost"));
        assert!(!is_valid_host_name("my host"));
        assert!(!is_valid_host_name("-edge"));
        assert!(is_valid_instance_name("My Server"));
        assert!(!is_valid_instance_name(""));
        assert!(!is_valid_instance_name(&"x".repeat(64)));
        assert!(is_valid_subtype_name("_printer"));
        assert!(!is_valid_subtype_name("_a.b"));
    }
}
