//! `GeomModelAPI` card attributes on the subject's default prim

use crate::layer::{Attribute, PrimSpec};
use crate::stage::Stage;
use crate::value::Value;
use cardgen_core::{CardImage, CardName, Error, Result};
use log::info;
use std::path::{Component, Path};

pub const APPLY_DRAW_MODE: &str = "model:applyDrawMode";
pub const CARD_GEOMETRY: &str = "model:cardGeometry";
pub const DRAW_MODE: &str = "model:drawMode";
pub const DRAW_MODE_COLOR: &str = "model:drawModeColor";

fn set_apply_draw_mode(prim: &mut PrimSpec, enabled: bool) {
    prim.set_attribute(Attribute::new("bool", APPLY_DRAW_MODE, Value::bool(enabled)).uniform());
}

/// Author the card defaults on the default prim: component kind,
/// `GeomModelAPI`, box card geometry, cards draw mode in red, and the
/// draw mode switched off until textures are linked.
pub fn apply_card_defaults(stage: &mut Stage) -> Result<()> {
    let prim = stage.default_prim_spec_mut()?;
    prim.metadata.set("kind", Value::token("component"));
    prim.metadata
        .prepend_unique("apiSchemas", Value::token("GeomModelAPI"));
    set_apply_draw_mode(prim, false);
    prim.set_attribute(Attribute::new("token", CARD_GEOMETRY, Value::token("box")).uniform());
    prim.set_attribute(Attribute::new("token", DRAW_MODE, Value::token("cards")).uniform());
    prim.set_attribute(
        Attribute::new(
            "float3",
            DRAW_MODE_COLOR,
            Value::Tuple(vec![
                Value::Number(1.0),
                Value::Number(0.0),
                Value::Number(0.0),
            ]),
        )
        .uniform(),
    );
    info!("Applied card defaults to /{}", prim.name);
    Ok(())
}

/// Asset path of `image` as authored on a layer in `directory`.
///
/// Images under the directory become relative paths with forward slashes;
/// anything else keeps its full path.
pub fn relative_asset_path(image: &Path, directory: &Path) -> String {
    let relative = if directory.as_os_str().is_empty() {
        Some(image)
    } else {
        image.strip_prefix(directory).ok()
    };
    match relative {
        Some(relative) if relative.is_relative() => relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                Component::ParentDir => Some("..".to_string()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
        _ => image.to_string_lossy().replace('\\', "/"),
    }
}

/// Point the six `model:cardTexture*` attributes at `images` and enable
/// the draw mode.
///
/// `images` must hold one image per card in card order, and every image
/// must exist on disk.
pub fn link_card_textures(stage: &mut Stage, images: &[CardImage]) -> Result<()> {
    let names: Vec<CardName> = images.iter().map(|image| image.card).collect();
    if names != CardName::ALL {
        return Err(Error::InvalidData(format!(
            "expected one image per card in order {:?}, got {:?}",
            CardName::ALL,
            names
        )));
    }
    let directory = stage.directory();
    for image in images {
        let on_disk = if image.path.is_absolute() || directory.as_os_str().is_empty() {
            image.path.clone()
        } else {
            directory.join(&image.path)
        };
        if !on_disk.is_file() {
            return Err(Error::MissingImage(on_disk));
        }
    }

    let prim = stage.default_prim_spec_mut()?;
    for image in images {
        let asset = relative_asset_path(&image.path, &directory);
        prim.set_attribute(Attribute::new(
            "asset",
            &image.card.texture_attribute(),
            Value::asset(asset),
        ));
    }
    set_apply_draw_mode(prim, true);
    info!("Linked {} card textures to /{}", images.len(), prim.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::{LayerConverter, NoConverter};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn subject(dir: &Path) -> Stage {
        let path = dir.join("subject.usda");
        std::fs::write(
            &path,
            "#usda 1.0\n(\n    defaultPrim = \"Asset\"\n)\n\ndef Xform \"Asset\"\n{\n}\n",
        )
        .unwrap();
        let converter: Arc<dyn LayerConverter> = Arc::new(NoConverter);
        Stage::open(&path, converter).unwrap()
    }

    fn images(dir: &Path) -> Vec<CardImage> {
        std::fs::create_dir_all(dir.join("renders")).unwrap();
        CardName::ALL
            .iter()
            .map(|&card| {
                let path = dir.join("renders").join(format!("{}.0.png", card));
                std::fs::write(&path, b"png").unwrap();
                CardImage { card, path }
            })
            .collect()
    }

    #[test]
    fn test_apply_defaults_twice_does_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let mut stage = subject(dir.path());
        apply_card_defaults(&mut stage).unwrap();
        apply_card_defaults(&mut stage).unwrap();
        assert!(stage.is_dirty());

        let prim = stage.layer().root_prim("Asset").unwrap();
        assert_eq!(prim.metadata.get("kind"), Some(&Value::token("component")));
        assert_eq!(
            prim.metadata.list_items("apiSchemas"),
            vec![&Value::token("GeomModelAPI")]
        );
        assert_eq!(prim.properties.len(), 4);
        assert_eq!(
            prim.attribute(APPLY_DRAW_MODE).unwrap().resolved_value(),
            Some(&Value::bool(false))
        );
        assert_eq!(
            prim.attribute(DRAW_MODE).unwrap().resolved_value(),
            Some(&Value::token("cards"))
        );
    }

    #[test]
    fn test_link_sets_relative_textures() {
        let dir = tempfile::tempdir().unwrap();
        let mut stage = subject(dir.path());
        let images = images(dir.path());
        link_card_textures(&mut stage, &images).unwrap();
        stage.save().unwrap();

        let text = std::fs::read_to_string(stage.path()).unwrap();
        assert!(text.contains("asset model:cardTextureXPos = @renders/XPos.0.png@"));
        assert!(text.contains("asset model:cardTextureZNeg = @renders/ZNeg.0.png@"));
        assert!(text.contains("uniform bool model:applyDrawMode = true"));
    }

    #[test]
    fn test_link_rejects_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let mut stage = subject(dir.path());
        let images = images(dir.path());
        std::fs::remove_file(&images[3].path).unwrap();
        match link_card_textures(&mut stage, &images) {
            Err(Error::MissingImage(path)) => assert!(path.ends_with("YNeg.0.png")),
            other => panic!("expected missing image, got {:?}", other),
        }
        assert!(stage
            .layer()
            .root_prim("Asset")
            .unwrap()
            .properties
            .is_empty());
    }

    #[test]
    fn test_link_rejects_wrong_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut stage = subject(dir.path());
        let mut images = images(dir.path());
        images.swap(0, 1);
        assert!(matches!(
            link_card_textures(&mut stage, &images),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_relative_asset_path() {
        assert_eq!(
            relative_asset_path(Path::new("/a/b/renders/XPos.0.png"), Path::new("/a/b")),
            "renders/XPos.0.png"
        );
        assert_eq!(
            relative_asset_path(Path::new("/elsewhere/x.png"), Path::new("/a/b")),
            "/elsewhere/x.png"
        );
        assert_eq!(
            relative_asset_path(&PathBuf::from("renders/YPos.0.png"), Path::new("")),
            "renders/YPos.0.png"
        );
    }
}
