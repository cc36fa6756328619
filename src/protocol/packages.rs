//! Installed-package payload.

use serde::Deserialize;

/// One entry of `ListPackagesResponse`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageData {
    pub package_name: String,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub source_directory: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_package() {
        let raw = r#"{"packageName":"com.example","isSystem":false,"sourceDirectory":"/data/app/com.example/base.apk"}"#;
        let p: PackageData = serde_json::from_str(raw).unwrap();
        assert_eq!(p.package_name, "com.example");
        assert!(!p.is_system);
        assert!(p.source_directory.ends_with("base.apk"));
    }
}
