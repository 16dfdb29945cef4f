use figment::Jail;

use kbsearch_core::config::{resolve_with_base, Config, Settings};
use std::path::Path;

#[test]
fn defaults_without_any_file() {
    Jail::expect_with(|_jail| {
        let settings = Config::load().expect("load").settings().expect("settings");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.search.limit_first, 20);
        assert_eq!(settings.search.limit_final, 5);
        assert!((settings.search.rerank_alpha - 0.6).abs() < 1e-6);
        assert_eq!(settings.search.cache_max_size, 200);
        assert!(!settings.search.use_cross_encoder);
        assert_eq!(settings.vector_store.vector_name, "fast-all-minilm-l6-v2");
        assert_eq!(settings.embedding.dim, 384);
        Ok(())
    });
}

#[test]
fn toml_then_env_override() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            [vector_store]
            collection = "kb"

            [search]
            limit_first = 40
            rerank_alpha = 0.5
            "#,
        )?;
        jail.set_env("APP_SEARCH__LIMIT_FINAL", "7");
        jail.set_env("RERANK_ALPHA", "0.3");
        let settings = Config::load().expect("load").settings().expect("settings");
        assert_eq!(settings.vector_store.collection, "kb");
        assert_eq!(settings.search.limit_first, 40);
        assert_eq!(settings.search.limit_final, 7);
        assert!((settings.search.rerank_alpha - 0.3).abs() < 1e-6, "legacy env wins over toml");
        Ok(())
    });
}

#[test]
fn env_specific_file_is_merged() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[search]\nlimit_first = 10\n")?;
        jail.create_file("config.prod.toml", "[search]\nlimit_first = 50\n")?;
        jail.set_env("RUST_ENV", "prod");
        let settings = Config::load().expect("load").settings().expect("settings");
        assert_eq!(settings.search.limit_first, 50);
        Ok(())
    });
}

#[test]
fn cross_encoder_flag_accepts_yes_and_one() {
    Jail::expect_with(|jail| {
        jail.set_env("USE_CROSS_ENCODER", "yes");
        assert!(Config::load().expect("load").settings().expect("settings").search.use_cross_encoder);
        jail.set_env("USE_CROSS_ENCODER", "1");
        assert!(Config::load().expect("load").settings().expect("settings").search.use_cross_encoder);
        jail.set_env("USE_CROSS_ENCODER", "off");
        assert!(!Config::load().expect("load").settings().expect("settings").search.use_cross_encoder);
        Ok(())
    });
}

#[test]
fn invalid_values_are_rejected() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[indexing]\nchunk_size = 100\nchunk_overlap = 100\n")?;
        assert!(Config::load().expect("load").settings().is_err());
        jail.create_file("config.toml", "[search]\nrerank_alpha = 1.5\n")?;
        assert!(Config::load().expect("load").settings().is_err());
        jail.create_file("config.toml", "[search]\nlimit_final = 0\n")?;
        assert!(Config::load().expect("load").settings().is_err());
        Ok(())
    });
}

#[test]
fn untyped_get_reads_nested_keys() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[indexing]\ndocs_dir = \"crawl\"\n")?;
        let config = Config::load().expect("load");
        let dir: String = config.get("indexing.docs_dir").expect("docs_dir");
        assert_eq!(dir, "crawl");
        assert!(config.get::<String>("missing.key").is_err());
        Ok(())
    });
}

#[test]
fn relative_paths_resolve_against_base() {
    let base = Path::new("/srv/kb");
    assert_eq!(resolve_with_base(base, "models/minilm"), Path::new("/srv/kb/models/minilm"));
    assert_eq!(resolve_with_base(base, "/opt/models"), Path::new("/opt/models"));
}

#[test]
fn embedding_model_env_renames_label_only() {
    Jail::expect_with(|jail| {
        jail.set_env("EMBEDDING_MODEL", "intfloat/multilingual-e5-small");
        let settings = Config::load().expect("load").settings().expect("settings");
        assert_eq!(settings.embedding.model_id, "intfloat/multilingual-e5-small");
        assert_eq!(settings.embedding.model_dir, Settings::default().embedding.model_dir);
        Ok(())
    });
}
