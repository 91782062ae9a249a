//! Integration tests for the registry public API.

use modreg::module::{ListQuery, ModuleIdentity};
use modreg::pack::ManifestPacker;
use modreg::registry::{ModuleRegistry, ARCHIVE_TITLE};
use modreg::staging::StagingArea;
use modreg::store::{ArtifactStore, MemoryStore};
use modreg::{ErrorKind, RegistryError};
use std::fs;
use std::io::{self, Read};
use tempfile::TempDir;

fn registry(staging: &TempDir) -> ModuleRegistry<MemoryStore> {
    ModuleRegistry::new(MemoryStore::new(), StagingArea::new(staging.path()))
}

struct BrokenReader;

impl Read for BrokenReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::other("disk on fire"))
    }
}

#[test]
fn publish_list_fetch_scenario() {
    let staging = TempDir::new().unwrap();
    let registry = registry(&staging);
    let archive = b"0123456789";
    let id = ModuleIdentity::new("acme", "vpc", "aws", "1.0.0");

    registry.publish_module(&id, &mut &archive[..]).unwrap();

    let page = registry
        .list_modules(&ListQuery::all().page(0, 100))
        .unwrap();
    let record = page
        .modules
        .iter()
        .find(|r| r.identity.namespace == "acme" && r.identity.name == "vpc")
        .expect("published module should be listed");
    assert_eq!(record.identity.provider, "aws");
    assert_eq!(record.identity.version, "1.0.0");
    assert_eq!(record.archive_size, Some(10));

    assert_eq!(registry.get_module_data(&id).unwrap(), archive);
}

#[test]
fn round_trip_preserves_bytes() {
    let staging = TempDir::new().unwrap();
    let registry = registry(&staging);

    let payloads: Vec<Vec<u8>> = vec![
        Vec::new(),
        b"x".to_vec(),
        (0..=255u8).cycle().take(200_000).collect(),
    ];

    for (i, payload) in payloads.iter().enumerate() {
        let id = ModuleIdentity::new("acme", "blob", "aws", format!("0.{}.0", i));
        registry.publish_module(&id, &mut payload.as_slice()).unwrap();
        assert_eq!(&registry.get_module_data(&id).unwrap(), payload);
    }
}

#[test]
fn republish_replaces_tag() {
    let staging = TempDir::new().unwrap();
    let registry = registry(&staging);
    let id = ModuleIdentity::new("acme", "vpc", "aws", "1.0.0");

    registry.publish_module(&id, &mut &b"first"[..]).unwrap();
    registry.publish_module(&id, &mut &b"second"[..]).unwrap();

    assert_eq!(registry.get_module_data(&id).unwrap(), b"second");

    let store = registry.connector();
    assert_eq!(store.tags("acme/vpc").unwrap(), vec!["1.0.0".to_string()]);

    let page = registry.list_modules(&ListQuery::all()).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.modules[0].archive_size, Some(6));
}

#[test]
fn list_returns_every_published_version() {
    let staging = TempDir::new().unwrap();
    let registry = registry(&staging);

    let published = [
        ("acme", "vpc", "aws", "1.0.0"),
        ("acme", "vpc", "aws", "1.1.0"),
        ("acme", "dns", "gcp", "0.3.0"),
        ("globex", "vpc", "azurerm", "2.0.0-rc.1"),
    ];
    for (ns, name, provider, version) in published {
        registry
            .publish_module(
                &ModuleIdentity::new(ns, name, provider, version),
                &mut &b"archive"[..],
            )
            .unwrap();
    }

    let page = registry.list_modules(&ListQuery::all()).unwrap();
    assert_eq!(page.total, published.len());

    for (ns, name, provider, version) in published {
        assert!(
            page.modules.iter().any(|r| r.identity
                == ModuleIdentity::new(ns, name, provider, version)),
            "missing {}/{}/{}@{}",
            ns,
            name,
            provider,
            version
        );
    }
}

#[test]
fn list_filters_and_paginates() {
    let staging = TempDir::new().unwrap();
    let registry = registry(&staging);

    for (ns, name, provider, version) in [
        ("acme", "vpc", "aws", "1.0.0"),
        ("acme", "vpc", "aws", "1.1.0"),
        ("acme", "dns", "gcp", "0.3.0"),
        ("globex", "vpc", "aws", "2.0.0"),
    ] {
        registry
            .publish_module(
                &ModuleIdentity::new(ns, name, provider, version),
                &mut &b"archive"[..],
            )
            .unwrap();
    }

    let acme = registry
        .list_modules(&ListQuery::all().namespace("acme"))
        .unwrap();
    assert_eq!(acme.total, 3);

    let vpcs = registry.list_modules(&ListQuery::all().name("vpc")).unwrap();
    assert_eq!(vpcs.total, 3);

    let gcp = registry
        .list_modules(&ListQuery::all().provider("gcp"))
        .unwrap();
    assert_eq!(gcp.total, 1);
    assert_eq!(gcp.modules[0].identity.name, "dns");

    let window = registry
        .list_modules(&ListQuery::all().page(1, 2))
        .unwrap();
    assert_eq!(window.total, 4);
    let versions: Vec<_> = window
        .modules
        .iter()
        .map(|r| r.identity.to_string())
        .collect();
    assert_eq!(versions, vec!["acme/vpc/aws@1.0.0", "acme/vpc/aws@1.1.0"]);

    let past_end = registry
        .list_modules(&ListQuery::all().page(10, 5))
        .unwrap();
    assert!(past_end.modules.is_empty());
    assert_eq!(past_end.total, 4);
}

#[test]
fn fetch_unpublished_is_not_found() {
    let staging = TempDir::new().unwrap();
    let registry = registry(&staging);

    let missing_repo = registry
        .get_module_data(&ModuleIdentity::new("acme", "vpc", "aws", "1.0.0"))
        .unwrap_err();
    assert_eq!(missing_repo.kind(), ErrorKind::NotFound);

    registry
        .publish_module(
            &ModuleIdentity::new("acme", "vpc", "aws", "1.0.0"),
            &mut &b"archive"[..],
        )
        .unwrap();

    let missing_tag = registry
        .get_module_data(&ModuleIdentity::new("acme", "vpc", "aws", "9.9.9"))
        .unwrap_err();
    assert!(matches!(missing_tag, RegistryError::NotFound { .. }));
}

#[test]
fn identical_archives_pack_to_identical_digests() {
    let temp = TempDir::new().unwrap();
    let first = temp.path().join("a.tgz");
    let second = temp.path().join("b.tgz");
    fs::write(&first, b"same bytes").unwrap();
    fs::write(&second, b"same bytes").unwrap();

    let annotations = ModuleIdentity::new("acme", "vpc", "aws", "1.0.0").annotations();
    let pack = |path: &std::path::Path| {
        let mut packer = ManifestPacker::new(modreg::oci::MODULE_ARTIFACT_TYPE);
        packer
            .add_file(path, ARCHIVE_TITLE, modreg::oci::MODULE_LAYER_MEDIA_TYPE)
            .unwrap();
        packer.pack(annotations.clone()).unwrap()
    };

    let a = pack(&first);
    let b = pack(&second);
    assert_eq!(a.descriptor.digest, b.descriptor.digest);
    assert_eq!(a.manifest_bytes, b.manifest_bytes);
}

#[test]
fn staging_failure_leaves_store_untouched() {
    let staging = TempDir::new().unwrap();
    let registry = registry(&staging);
    let id = ModuleIdentity::new("acme", "vpc", "aws", "1.0.0");

    let err = registry.publish_module(&id, &mut BrokenReader).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Staging);

    let store = registry.connector();
    assert_eq!(store.blob_push_count(), 0);
    assert!(store.repositories().unwrap().is_empty());
    assert!(registry.get_module_data(&id).unwrap_err().is_not_found());

    assert_eq!(fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[test]
fn concurrent_publishes_use_distinct_staging_files() {
    let staging = TempDir::new().unwrap();
    let registry = registry(&staging);

    std::thread::scope(|scope| {
        for i in 0..8 {
            let registry = &registry;
            scope.spawn(move || {
                let id = ModuleIdentity::new("acme", format!("mod{}", i), "aws", "1.0.0");
                let payload = format!("payload {}", i);
                registry
                    .publish_module(&id, &mut payload.as_bytes())
                    .unwrap();
            });
        }
    });

    for i in 0..8 {
        let id = ModuleIdentity::new("acme", format!("mod{}", i), "aws", "1.0.0");
        assert_eq!(
            registry.get_module_data(&id).unwrap(),
            format!("payload {}", i).into_bytes()
        );
    }
    assert_eq!(fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[test]
fn offline_store_is_unavailable() {
    let staging = TempDir::new().unwrap();
    let registry = registry(&staging);
    registry.connector().set_offline(true);

    let err = registry.list_modules(&ListQuery::all()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
}

#[test]
fn packed_manifest_wire_format() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("vpc.tgz");
    fs::write(&path, b"0123456789").unwrap();

    let mut packer = ManifestPacker::new(modreg::oci::MODULE_ARTIFACT_TYPE);
    packer
        .add_file(&path, ARCHIVE_TITLE, modreg::oci::MODULE_LAYER_MEDIA_TYPE)
        .unwrap();
    let packed = packer
        .pack(ModuleIdentity::new("acme", "vpc", "aws", "1.0.0").annotations())
        .unwrap();

    let expected = concat!(
        r#"{"schemaVersion":2,"#,
        r#""mediaType":"application/vnd.oci.image.manifest.v1+json","#,
        r#""artifactType":"application/vnd.opentofu.module","#,
        r#""config":{"mediaType":"application/vnd.oci.empty.v1+json","#,
        r#""digest":"sha256:44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a","size":2},"#,
        r#""layers":[{"mediaType":"application/vnd.opentofu.module.v1+tgz","#,
        r#""digest":"sha256:84d89877f0d4041efb6bf91a16f0248f2fd573e6af05c19f96bedb9f882f7882","size":10,"#,
        r#""annotations":{"org.opencontainers.image.title":"module.tgz"}}],"#,
        r#""annotations":{"org.opentofu.module.namespace":"acme","#,
        r#""org.opentofu.module.provider":"aws","org.opentofu.module.version":"1.0.0"}}"#,
    );
    assert_eq!(String::from_utf8(packed.manifest_bytes).unwrap(), expected);
    assert_eq!(
        packed.descriptor.digest.as_str(),
        "sha256:6e6c50ccd6596272989b7be5cf31526d50f6518344f91f950bcd15cb96d8638e"
    );
}
