//! Integration tests for cardgen-usd
//!
//! These tests drive a subject through the steps the card pipeline takes:
//! open, bound, author the rig, apply defaults, link and save.

use approx::assert_relative_eq;
use cardgen_core::{build_camera_rig, CardImage, CardName, RenderPurpose};
use cardgen_usd::*;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const WHEEL: &str = r#"#usda 1.0
(
    defaultPrim = "Wheel"
)

def Cylinder "Wheel"
{
    uniform token axis = "X"
    double height = 2
    double radius = 5
}
"#;

const CAR: &str = r#"#usda 1.0
(
    defaultPrim = "Car"
    metersPerUnit = 0.01
    upAxis = "Y"
)

def Xform "Car" (
    kind = "assembly"
)
{
    def Cube "Body"
    {
        double size = 20
        float3 xformOp:scale = (2, 1, 1)
        double3 xformOp:translate = (0, 10, 0)
        uniform token[] xformOpOrder = ["xformOp:translate", "xformOp:scale"]
    }

    def "FrontWheel" (
        prepend references = @./wheel.usda@
    )
    {
        double3 xformOp:translate = (15, 0, 0)
        uniform token[] xformOpOrder = ["xformOp:translate"]
    }

    def Cube "Collision" (
        doc = "proxy volume, excluded unless proxies are requested"
    )
    {
        uniform token purpose = "proxy"
        double size = 400
    }
}
"#;

fn converter() -> Arc<dyn LayerConverter> {
    Arc::new(NoConverter)
}

fn write_scene(dir: &Path) -> std::path::PathBuf {
    std::fs::write(dir.join("wheel.usda"), WHEEL).unwrap();
    let path = dir.join("car.usda");
    std::fs::write(&path, CAR).unwrap();
    path
}

#[test]
fn test_bounds_follow_references_and_purposes() {
    let dir = tempfile::tempdir().unwrap();
    let stage = Stage::open(write_scene(dir.path()), converter()).unwrap();

    let bounds = stage.world_bounds(&[RenderPurpose::Default]).unwrap();
    // body spans x -20..20, y 0..20; the wheel at x 15 spans 14..16 and y -5..5
    assert_relative_eq!(bounds.min.x, -20.0);
    assert_relative_eq!(bounds.max.x, 20.0);
    assert_relative_eq!(bounds.min.y, -5.0);
    assert_relative_eq!(bounds.max.y, 20.0);
    assert_relative_eq!(bounds.min.z, -10.0);
    assert_relative_eq!(bounds.max.z, 10.0);

    let with_proxy = stage
        .world_bounds(&[RenderPurpose::Default, RenderPurpose::Proxy])
        .unwrap();
    assert_relative_eq!(with_proxy.max.x, 200.0);
}

#[test]
fn test_rig_sublayers_subject_and_frames_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let subject = write_scene(dir.path());
    let stage = Stage::open(&subject, converter()).unwrap();
    let bounds = stage.world_bounds(&[RenderPurpose::Default]).unwrap();
    let cameras = build_camera_rig(&bounds).unwrap();

    let rig_path = dir.path().join("cameras.usda");
    write_layer(&build_rig_layer("./car.usda", &cameras, None), &rig_path).unwrap();

    // the rig composes the subject's geometry underneath its cameras
    let rig = Stage::open(&rig_path, converter()).unwrap();
    let scene = rig.compose().unwrap();
    assert!(scene.prim_at_path("/Car/FrontWheel").is_some());
    assert!(scene.prim_at_path(&camera_path(CardName::ZNeg)).is_some());
    assert_eq!(rig.default_prim().unwrap(), RIG_ROOT);

    // cameras contribute no geometry
    let rig_bounds = rig.world_bounds(&[RenderPurpose::Default]).unwrap();
    assert_eq!(rig_bounds, bounds);
}

#[test]
fn test_defaults_and_links_survive_save() {
    let dir = tempfile::tempdir().unwrap();
    let subject = write_scene(dir.path());
    let mut stage = Stage::open(&subject, converter()).unwrap();
    apply_card_defaults(&mut stage).unwrap();

    std::fs::create_dir_all(dir.path().join("renders")).unwrap();
    let images: Vec<CardImage> = CardName::ALL
        .iter()
        .map(|&card| {
            let path = dir.path().join("renders").join(format!("{}.0.png", card));
            std::fs::write(&path, b"\x89PNG").unwrap();
            CardImage { card, path }
        })
        .collect();
    link_card_textures(&mut stage, &images).unwrap();
    stage.save().unwrap();

    let reopened = Stage::open(&subject, converter()).unwrap();
    let car = reopened.layer().root_prim("Car").unwrap();
    assert_eq!(car.metadata.get("kind"), Some(&Value::token("component")));
    assert_eq!(
        car.attribute("model:cardTextureYNeg").unwrap().resolved_value(),
        Some(&Value::asset("renders/YNeg.0.png"))
    );
    assert_eq!(
        car.attribute("model:applyDrawMode")
            .unwrap()
            .resolved_value()
            .and_then(Value::as_bool),
        Some(true)
    );
    // untouched content is preserved
    assert!(car.child("FrontWheel").is_some());
    assert_eq!(
        reopened.layer().metadata.get("upAxis"),
        Some(&Value::string("Y"))
    );
}

#[test]
fn test_usdz_wrapper_bounds_and_links() {
    let dir = tempfile::tempdir().unwrap();
    let usdz = dir.path().join("wheel.usdz");
    let mut writer = ZipWriter::new(std::fs::File::create(&usdz).unwrap());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    writer.start_file("wheel.usda", options).unwrap();
    writer.write_all(WHEEL.as_bytes()).unwrap();
    writer.finish().unwrap();

    assert!(is_package_path(&usdz));
    let mut stage = Stage::create_usdz_wrapper(&usdz, converter()).unwrap();
    assert_eq!(stage.path(), wrapper_path(&usdz));

    let bounds = stage.world_bounds(&[RenderPurpose::Default]).unwrap();
    assert_relative_eq!(bounds.max.x, 1.0);
    assert_relative_eq!(bounds.max.y, 5.0);

    apply_card_defaults(&mut stage).unwrap();
    stage.save().unwrap();
    let text = std::fs::read_to_string(stage.path()).unwrap();
    assert!(text.contains("subLayers = [@./wheel.usdz@]"));
    assert!(text.contains("over \"Wheel\""));
    assert!(text.contains("prepend apiSchemas = [\"GeomModelAPI\"]"));
}
