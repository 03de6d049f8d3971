// ABOUTME: Integration tests for validated identifiers and domain types.
// ABOUTME: Image references, function names, regions, resource names, and typed ids.

use stacklink::types::*;

mod image_ref_tests {
    use super::*;

    #[test]
    fn bare_repository_defaults_to_latest() {
        let img = ImageRef::parse("app").unwrap();
        assert_eq!(img.name(), "app");
        assert_eq!(img.tag(), Some("latest"));
        assert!(img.registry().is_none());
        assert!(img.digest().is_none());
    }

    #[test]
    fn registry_repository_and_tag() {
        let img =
            ImageRef::parse("123456789012.dkr.ecr.us-east-1.amazonaws.com/app:v2").unwrap();
        assert_eq!(img.registry(), Some("123456789012.dkr.ecr.us-east-1.amazonaws.com"));
        assert_eq!(img.name(), "app");
        assert_eq!(img.tag(), Some("v2"));
    }

    #[test]
    fn registry_port_is_not_a_tag() {
        let img = ImageRef::parse("localhost:5000/app").unwrap();
        assert_eq!(img.registry(), Some("localhost:5000"));
        assert_eq!(img.tag(), Some("latest"));
    }

    #[test]
    fn digest_only_reference_has_no_tag() {
        let img = ImageRef::parse("repo/app@sha256:abc123").unwrap();
        assert_eq!(img.digest(), Some("sha256:abc123"));
        assert!(img.tag().is_none());
    }

    #[test]
    fn repository_url_plus_tag() {
        let img = ImageRef::for_repository("registry.example.com/app/", "v3").unwrap();
        assert_eq!(img.to_string(), "registry.example.com/app:v3");
    }

    #[test]
    fn pinning_swaps_the_tag_for_the_digest() {
        let img = ImageRef::parse("registry.example.com/app:v3").unwrap();
        let pinned = img.pinned(&ImageDigest::new("sha256:feedface"));
        assert_eq!(pinned.to_string(), "registry.example.com/app@sha256:feedface");
        assert_eq!(pinned.repository(), img.repository());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(ImageRef::parse("").is_err());
        assert!(ImageRef::parse("invalid image!").is_err());
        assert!(ImageRef::parse("app:").is_err());
        assert!(ImageRef::parse("app@").is_err());
    }

    #[test]
    fn serializes_as_a_string() {
        let img = ImageRef::parse("registry.example.com/app:v3").unwrap();
        let json = serde_json::to_string(&img).unwrap();
        assert_eq!(json, "\"registry.example.com/app:v3\"");
        let back: ImageRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, img);
        assert!(serde_json::from_str::<ImageRef>("\"bad image\"").is_err());
    }
}

mod function_name_tests {
    use super::*;

    #[test]
    fn plain_names_and_arns() {
        assert!(!FunctionName::new("f1").unwrap().is_arn());
        let arn = FunctionName::new("arn:aws:lambda:us-east-1:123456789012:function:f1").unwrap();
        assert!(arn.is_arn());
    }

    #[test]
    fn colons_only_inside_arns() {
        assert!(matches!(
            FunctionName::new("my:function"),
            Err(FunctionNameError::InvalidChar(':'))
        ));
    }

    #[test]
    fn empty_and_overlong_names() {
        assert!(matches!(FunctionName::new("  "), Err(FunctionNameError::Empty)));
        assert!(matches!(
            FunctionName::new(&"f".repeat(65)),
            Err(FunctionNameError::TooLong(_))
        ));
    }
}

mod region_tests {
    use super::*;

    #[test]
    fn accepts_short_and_long_forms() {
        assert_eq!(Region::new("us-east-1").unwrap().as_str(), "us-east-1");
        assert_eq!(Region::new("r1").unwrap().as_str(), "r1");
    }

    #[test]
    fn rejects_bad_regions() {
        assert!(matches!(Region::new(""), Err(RegionError::Empty)));
        assert!(matches!(Region::new("US-EAST-1"), Err(RegionError::InvalidChar('U'))));
        assert!(matches!(Region::new("-east"), Err(RegionError::InvalidFormat(_))));
    }
}

mod resource_name_tests {
    use super::*;

    #[test]
    fn valid_dns_label() {
        assert_eq!(ResourceName::new("function-image").unwrap().as_str(), "function-image");
        assert!(ResourceName::new(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn rejects_bad_names() {
        assert!(matches!(ResourceName::new(""), Err(ResourceNameError::Empty)));
        assert!(matches!(
            ResourceName::new(&"a".repeat(64)),
            Err(ResourceNameError::TooLong)
        ));
        assert!(matches!(
            ResourceName::new("-image"),
            Err(ResourceNameError::EdgeHyphen)
        ));
        assert!(matches!(
            ResourceName::new("Image"),
            Err(ResourceNameError::NotLowercase)
        ));
        assert!(matches!(
            ResourceName::new("my_image"),
            Err(ResourceNameError::InvalidChar('_'))
        ));
    }
}

mod id_tests {
    use super::*;

    #[test]
    fn ids_keep_their_value() {
        assert_eq!(RecordId::new("f1_20260101T000000000Z").as_str(), "f1_20260101T000000000Z");
        assert_eq!(RegistryId::new("123456789012").into_inner(), "123456789012");
        assert_eq!(ImageDigest::new("sha256:abc").to_string(), "sha256:abc");
    }
}
