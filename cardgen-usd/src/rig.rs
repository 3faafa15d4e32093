//! Camera rig layer authoring
//!
//! The rig is a throwaway layer that sublayers the subject and adds one
//! camera per card under `/CardGenerator`, plus an optional dome light.

use crate::layer::{Attribute, Layer, PrimSpec, Specifier};
use crate::value::Value;
use cardgen_core::{CameraRecord, CardName};

/// Root prim of the rig layer
pub const RIG_ROOT: &str = "CardGenerator";

/// Scene units of the rig: centimetres
pub const RIG_METERS_PER_UNIT: f64 = 0.01;

/// Prim path of the camera for `card`
pub fn camera_path(card: CardName) -> String {
    format!("/{}/{}", RIG_ROOT, card)
}

/// Build the rig layer.
///
/// `subject` is the asset path of the subject layer as seen from the rig
/// file; `dome_light` is an optional latlong environment texture.
pub fn build_rig_layer(subject: &str, cameras: &[CameraRecord], dome_light: Option<&str>) -> Layer {
    let mut layer = Layer::new("cameras.usda");
    layer.set_default_prim(RIG_ROOT);
    layer
        .metadata
        .set("metersPerUnit", Value::Number(RIG_METERS_PER_UNIT));
    layer.set_sub_layers([subject]);

    let mut root = PrimSpec::new(Specifier::Def, None, RIG_ROOT);
    root.children.extend(cameras.iter().map(camera_prim));
    if let Some(texture) = dome_light {
        root.children.push(dome_light_prim(texture));
    }
    layer.prims.push(root);
    layer
}

fn float(name: &str, value: f64) -> Attribute {
    Attribute::new("float", name, Value::Number(value))
}

fn camera_prim(camera: &CameraRecord) -> PrimSpec {
    let mut prim = PrimSpec::new(Specifier::Def, Some("Camera"), camera.name.as_str());
    prim.set_attribute(float("focalLength", camera.focal_length));
    prim.set_attribute(float("focusDistance", camera.focus_distance));
    prim.set_attribute(float("fStop", camera.f_stop));
    prim.set_attribute(float("horizontalAperture", camera.horizontal_aperture));
    prim.set_attribute(float("horizontalApertureOffset", 0.0));
    prim.set_attribute(Attribute::new(
        "token",
        "projection",
        Value::token("perspective"),
    ));
    prim.set_attribute(float("verticalAperture", camera.vertical_aperture));
    prim.set_attribute(float("verticalApertureOffset", 0.0));

    let mut op_order = vec![Value::token("xformOp:translate")];
    prim.set_attribute(Attribute::new(
        "double3",
        "xformOp:translate",
        Value::vec3(&camera.translation),
    ));
    for (i, rotation) in camera.rotations.iter().enumerate() {
        let base = format!("xformOp:rotate{}", rotation.axis);
        // repeated axes need a suffix to stay distinct ops
        let repeats = camera.rotations[..i]
            .iter()
            .filter(|earlier| earlier.axis == rotation.axis)
            .count();
        let name = if repeats == 0 {
            base
        } else {
            format!("{}:rotate{}", base, repeats + 1)
        };
        prim.set_attribute(float(&name, rotation.degrees));
        op_order.push(Value::token(name));
    }
    prim.set_attribute(Attribute::new("token[]", "xformOpOrder", Value::List(op_order)).uniform());
    prim
}

fn dome_light_prim(texture: &str) -> PrimSpec {
    let mut prim = PrimSpec::new(Specifier::Def, Some("DomeLight"), "DomeLight");
    prim.set_attribute(Attribute::new(
        "asset",
        "inputs:texture:file",
        Value::asset(texture),
    ));
    prim.set_attribute(
        Attribute::new("token", "inputs:texture:format", Value::token("latlong")).uniform(),
    );
    prim
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::local_transform;
    use crate::compose::compose_scene;
    use crate::parser::parse_layer;
    use crate::resolve::{AssetLocation, LayerLoader, LoadedLayer, NoConverter};
    use crate::writer::layer_to_string;
    use approx::assert_relative_eq;
    use cardgen_core::{build_camera_rig, Bounds3d, Point3d, Vector3d};

    fn rig() -> Layer {
        let bounds = Bounds3d::new(Point3d::new(-50.0, -50.0, 0.0), Point3d::new(50.0, 50.0, 200.0));
        let cameras = build_camera_rig(&bounds).unwrap();
        build_rig_layer("./subject.usda", &cameras, Some("./sky.hdr"))
    }

    #[test]
    fn test_rig_layer_metadata() {
        let layer = rig();
        assert_eq!(layer.default_prim(), Some(RIG_ROOT));
        assert_eq!(layer.sub_layers(), vec!["./subject.usda"]);
        assert_eq!(
            layer.metadata.get("metersPerUnit"),
            Some(&Value::Number(0.01))
        );
        let root = layer.root_prim(RIG_ROOT).unwrap();
        let names: Vec<&str> = root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["XPos", "XNeg", "YPos", "YNeg", "ZPos", "ZNeg", "DomeLight"]
        );
    }

    #[test]
    fn test_dome_light_attributes() {
        let layer = rig();
        let light = layer.prim_at_path("/CardGenerator/DomeLight").unwrap();
        assert_eq!(light.type_name.as_deref(), Some("DomeLight"));
        assert_eq!(
            light.attribute("inputs:texture:file").unwrap().resolved_value(),
            Some(&Value::asset("./sky.hdr"))
        );
        assert_eq!(
            light.attribute("inputs:texture:format").unwrap().resolved_value(),
            Some(&Value::token("latlong"))
        );
    }

    #[test]
    fn test_written_rig_cameras_face_subject() {
        let text = layer_to_string(&rig());
        let layer = parse_layer(&text, "cameras.usda").unwrap();
        let loader = LayerLoader::new(&NoConverter);
        let root = LoadedLayer {
            location: AssetLocation::File("cameras.usda".into()),
            layer,
        };
        let scene = compose_scene(&loader, &root).unwrap();
        let center = Vector3d::new(0.0, 0.0, 100.0);

        for name in CardName::ALL {
            let camera = scene.prim_at_path(&camera_path(name)).unwrap();
            assert_eq!(camera.type_name.as_deref(), Some("Camera"));
            let (transform, _) = local_transform(camera);
            let position = transform.transform_point(&Point3d::origin()).coords;
            let view = transform.transform_vector(&Vector3d::new(0.0, 0.0, -1.0));
            let to_center = (center - position).normalize();
            assert_relative_eq!(view.dot(&to_center), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_repeated_rotation_axis_gets_suffix() {
        use cardgen_core::{Axis, Rotation};
        let bounds = Bounds3d::new(Point3d::new(-1.0, -1.0, -1.0), Point3d::new(1.0, 1.0, 1.0));
        let mut camera = build_camera_rig(&bounds).unwrap().remove(0);
        camera.rotations = vec![Rotation::new(Axis::Y, 90.0), Rotation::new(Axis::Y, 90.0)];
        let prim = camera_prim(&camera);
        let order = prim.attribute("xformOpOrder").unwrap().resolved_value().unwrap();
        assert_eq!(
            order.as_string_array().unwrap(),
            vec!["xformOp:translate", "xformOp:rotateY", "xformOp:rotateY:rotate2"]
        );
    }
}
