//! World-space bounding boxes of composed scenes

use crate::compose::{ComposedPrim, ComposedScene};
use crate::value::Value;
use cardgen_core::{Axis, Bounds3d, Matrix4d, Point3d, RenderPurpose, Transform3D, Vector3d};
use log::warn;

const POINT_BASED_TYPES: [&str; 7] = [
    "Mesh",
    "Points",
    "BasisCurves",
    "NurbsCurves",
    "NurbsPatch",
    "HermiteCurves",
    "TetMesh",
];

/// Bounds of every prim on stage whose computed purpose is in `purposes`.
///
/// Traversal skips inactive, undefined and abstract prims as well as
/// invisible subtrees. The result is empty when nothing contributes.
pub fn world_bounds(scene: &ComposedScene, purposes: &[RenderPurpose]) -> Bounds3d {
    let mut bounds = Bounds3d::empty();
    for prim in &scene.roots {
        accumulate(
            prim,
            &Transform3D::identity(),
            RenderPurpose::Default,
            purposes,
            &mut bounds,
        );
    }
    bounds
}

fn accumulate(
    prim: &ComposedPrim,
    parent_world: &Transform3D,
    parent_purpose: RenderPurpose,
    purposes: &[RenderPurpose],
    bounds: &mut Bounds3d,
) {
    if !prim.active || !prim.is_defined() || prim.is_abstract() {
        return;
    }
    if prim.value("visibility").and_then(Value::as_str) == Some("invisible") {
        return;
    }

    let purpose = match prim.value("purpose").and_then(Value::as_str) {
        Some(name) => name.parse().unwrap_or_else(|_| {
            warn!("{} has unknown purpose '{}'", prim.path, name);
            parent_purpose
        }),
        None => parent_purpose,
    };

    let (local, resets) = local_transform(prim);
    let world = if resets {
        local
    } else {
        parent_world.compose(local)
    };

    if purposes.contains(&purpose) {
        if let Some(local_bounds) = local_bounds(prim) {
            bounds.union(&local_bounds.transformed(&world));
        }
    }

    for child in &prim.children {
        accumulate(child, &world, purpose, purposes, bounds);
    }
}

/// Local-to-parent transform from the prim's `xformOpOrder`.
///
/// The flag is set when the stack contains `!resetXformStack!`, meaning
/// the prim ignores its parent's transform.
pub fn local_transform(prim: &ComposedPrim) -> (Transform3D, bool) {
    let order = match prim.value("xformOpOrder").and_then(Value::as_string_array) {
        Some(order) => order,
        None => return (Transform3D::identity(), false),
    };

    let mut transform = Transform3D::identity();
    let mut resets = false;
    for op in order {
        if op == "!resetXformStack!" {
            transform = Transform3D::identity();
            resets = true;
            continue;
        }
        let (invert, name) = match op.strip_prefix("!invert!") {
            Some(name) => (true, name),
            None => (false, op),
        };
        let Some(kind) = name.strip_prefix("xformOp:").and_then(|rest| rest.split(':').next()) else {
            warn!("Ignoring malformed xform op '{}' on {}", op, prim.path);
            continue;
        };
        // an op without a value is the identity
        let Some(value) = prim.value(name) else {
            continue;
        };
        let Some(mut op_transform) = xform_op(kind, value) else {
            warn!("Ignoring unsupported xform op '{}' on {}", op, prim.path);
            continue;
        };
        if invert {
            match op_transform.inverse() {
                Some(inverse) => op_transform = inverse,
                None => {
                    warn!("Xform op '{}' on {} is not invertible", op, prim.path);
                    continue;
                }
            }
        }
        transform = transform.compose(op_transform);
    }
    (transform, resets)
}

fn xform_op(kind: &str, value: &Value) -> Option<Transform3D> {
    match kind {
        "translate" => value.as_vec3().map(Transform3D::translation),
        "scale" => value
            .as_vec3()
            .or_else(|| value.as_f64().map(Vector3d::repeat))
            .map(Transform3D::scaling),
        "rotateX" | "rotateY" | "rotateZ" => {
            let axis = kind.chars().last().and_then(Axis::from_letter)?;
            value
                .as_f64()
                .map(|degrees| Transform3D::rotation_about(axis, degrees))
        }
        "orient" => match value.as_numbers()?.as_slice() {
            [w, i, j, k] => Some(Transform3D::rotation_quaternion(*w, *i, *j, *k)),
            _ => None,
        },
        // authored row-major for row vectors
        "transform" => value
            .as_matrix_rows()
            .map(|rows| Transform3D::from(Matrix4d::from_fn(|r, c| rows[c][r]))),
        other => {
            let letters: Vec<char> = other.strip_prefix("rotate")?.chars().collect();
            if letters.len() != 3 {
                return None;
            }
            let mut order = [Axis::X; 3];
            for (slot, letter) in order.iter_mut().zip(&letters) {
                *slot = Axis::from_letter(*letter)?;
            }
            if order[0] == order[1] || order[1] == order[2] || order[0] == order[2] {
                return None;
            }
            value
                .as_vec3()
                .map(|degrees| Transform3D::rotation_euler(order, degrees))
        }
    }
}

fn number(prim: &ComposedPrim, name: &str, fallback: f64) -> f64 {
    prim.value(name).and_then(Value::as_f64).unwrap_or(fallback)
}

fn axis_of(prim: &ComposedPrim) -> Axis {
    prim.value("axis")
        .and_then(Value::as_str)
        .and_then(|axis| axis.chars().next())
        .and_then(Axis::from_letter)
        .unwrap_or(Axis::Z)
}

/// Box with half-size `along` on `axis` and `across` on the other two axes
fn axis_aligned(axis: Axis, across: f64, along: f64) -> Bounds3d {
    let mut half = Vector3d::repeat(across);
    half[axis.index()] = along;
    Bounds3d::new(Point3d::from(-half), Point3d::from(half))
}

fn radius(prim: &ComposedPrim, fallback: f64) -> f64 {
    let top = prim.value("radiusTop").and_then(Value::as_f64);
    let bottom = prim.value("radiusBottom").and_then(Value::as_f64);
    match (top, bottom) {
        (Some(top), Some(bottom)) => top.max(bottom),
        (Some(r), None) | (None, Some(r)) => r,
        (None, None) => number(prim, "radius", fallback),
    }
}

/// Bounds of the prim's own geometry in its local space
pub fn local_bounds(prim: &ComposedPrim) -> Option<Bounds3d> {
    if let Some(extent) = prim.value("extent").and_then(Value::as_point_array) {
        if let [min, max] = extent.as_slice() {
            return Some(Bounds3d::new(*min, *max));
        }
    }

    let type_name = prim.type_name.as_deref()?;
    match type_name {
        t if POINT_BASED_TYPES.contains(&t) => {
            let points = prim.value("points")?.as_point_array()?;
            if points.is_empty() {
                None
            } else {
                Some(Bounds3d::from_points(&points))
            }
        }
        "Cube" => {
            let half = number(prim, "size", 2.0) / 2.0;
            Some(axis_aligned(Axis::Z, half, half))
        }
        "Sphere" => {
            let r = number(prim, "radius", 1.0);
            Some(axis_aligned(Axis::Z, r, r))
        }
        "Cylinder" | "Cylinder_1" | "Cone" => Some(axis_aligned(
            axis_of(prim),
            radius(prim, 1.0),
            number(prim, "height", 2.0) / 2.0,
        )),
        "Capsule" | "Capsule_1" => {
            let r = radius(prim, 0.5);
            Some(axis_aligned(
                axis_of(prim),
                r,
                number(prim, "height", 1.0) / 2.0 + r,
            ))
        }
        "Plane" => {
            let half_width = number(prim, "width", 2.0) / 2.0;
            let half_length = number(prim, "length", 2.0) / 2.0;
            let half = match axis_of(prim) {
                Axis::X => Vector3d::new(0.0, half_length, half_width),
                Axis::Y => Vector3d::new(half_width, 0.0, half_length),
                Axis::Z => Vector3d::new(half_width, half_length, 0.0),
            };
            Some(Bounds3d::new(Point3d::from(-half), Point3d::from(half)))
        }
        "PointInstancer" => {
            warn!("{} is a PointInstancer without an authored extent", prim.path);
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::compose_scene;
    use crate::parser::parse_layer;
    use crate::resolve::{AssetLocation, LayerLoader, LoadedLayer, NoConverter};
    use approx::assert_relative_eq;

    fn scene(source: &str) -> ComposedScene {
        let loader = LayerLoader::new(&NoConverter);
        let root = LoadedLayer {
            location: AssetLocation::File("scene.usda".into()),
            layer: parse_layer(source, "scene.usda").unwrap(),
        };
        compose_scene(&loader, &root).unwrap()
    }

    fn assert_bounds(bounds: &Bounds3d, min: [f64; 3], max: [f64; 3]) {
        for i in 0..3 {
            assert_relative_eq!(bounds.min[i], min[i], epsilon = 1e-9);
            assert_relative_eq!(bounds.max[i], max[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_translated_cube() {
        let scene = scene(
            r#"#usda 1.0
def Xform "Root"
{
    double3 xformOp:translate = (10, 0, 0)
    uniform token[] xformOpOrder = ["xformOp:translate"]

    def Cube "Box"
    {
        double size = 4
    }
}
"#,
        );
        let bounds = world_bounds(&scene, &[RenderPurpose::Default]);
        assert_bounds(&bounds, [8.0, -2.0, -2.0], [12.0, 2.0, 2.0]);
    }

    #[test]
    fn test_mesh_points_and_scale_rotate() {
        let scene = scene(
            r#"#usda 1.0
def Mesh "Plank"
{
    point3f[] points = [(0, 0, 0), (2, 1, 0), (2, 0, 1)]
    float3 xformOp:scale = (1, 2, 3)
    float xformOp:rotateZ = 90
    uniform token[] xformOpOrder = ["xformOp:rotateZ", "xformOp:scale"]
}
"#,
        );
        let bounds = world_bounds(&scene, &[RenderPurpose::Default]);
        // scaled to x 0..2, y 0..2, z 0..3 then rotated +90 about Z: (x, y) -> (-y, x)
        assert_bounds(&bounds, [-2.0, 0.0, 0.0], [0.0, 2.0, 3.0]);
    }

    #[test]
    fn test_extent_wins_over_points() {
        let scene = scene(
            r#"#usda 1.0
def Mesh "M"
{
    float3[] extent = [(-5, -5, -5), (5, 5, 5)]
    point3f[] points = [(0, 0, 0), (1, 1, 1)]
}
"#,
        );
        let bounds = world_bounds(&scene, &[RenderPurpose::Default]);
        assert_bounds(&bounds, [-5.0; 3], [5.0; 3]);
    }

    #[test]
    fn test_purpose_filter_and_inheritance() {
        let source = r#"#usda 1.0
def Xform "Root"
{
    def Sphere "Body"
    {
    }

    def Xform "Guides"
    {
        uniform token purpose = "guide"

        def Cube "Handle"
        {
            double size = 100
        }
    }
}
"#;
        let scene = scene(source);
        let defaults = world_bounds(&scene, &[RenderPurpose::Default]);
        assert_bounds(&defaults, [-1.0; 3], [1.0; 3]);
        let with_guides = world_bounds(&scene, &[RenderPurpose::Default, RenderPurpose::Guide]);
        assert_bounds(&with_guides, [-50.0; 3], [50.0; 3]);
    }

    #[test]
    fn test_invisible_and_class_prims_skipped() {
        let scene = scene(
            r#"#usda 1.0
def Sphere "Seen"
{
}

def Cube "Hidden"
{
    token visibility = "invisible"
    double size = 100
}

class Cube "Template"
{
    double size = 100
}

over Cube "NotDefined"
{
    double size = 100
}
"#,
        );
        let bounds = world_bounds(&scene, &[RenderPurpose::Default]);
        assert_bounds(&bounds, [-1.0; 3], [1.0; 3]);
    }

    #[test]
    fn test_reset_xform_stack_ignores_parent() {
        let scene = scene(
            r#"#usda 1.0
def Xform "Far"
{
    double3 xformOp:translate = (100, 0, 0)
    uniform token[] xformOpOrder = ["xformOp:translate"]

    def Sphere "Local"
    {
        uniform token[] xformOpOrder = ["!resetXformStack!"]
    }
}
"#,
        );
        let bounds = world_bounds(&scene, &[RenderPurpose::Default]);
        assert_bounds(&bounds, [-1.0; 3], [1.0; 3]);
    }

    #[test]
    fn test_matrix_and_inverted_ops() {
        let scene = scene(
            r#"#usda 1.0
def Sphere "S"
{
    matrix4d xformOp:transform = ( (1, 0, 0, 0), (0, 1, 0, 0), (0, 0, 1, 0), (5, 6, 7, 1) )
    double3 xformOp:translate:pivot = (1, 0, 0)
    uniform token[] xformOpOrder = ["xformOp:transform", "xformOp:translate:pivot", "!invert!xformOp:translate:pivot"]
}
"#,
        );
        let bounds = world_bounds(&scene, &[RenderPurpose::Default]);
        assert_bounds(&bounds, [4.0, 5.0, 6.0], [6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_rotate_xyz_order() {
        let scene = scene(
            r#"#usda 1.0
def Cylinder "C"
{
    double height = 10
    double radius = 1
    float3 xformOp:rotateXYZ = (90, 0, 90)
    uniform token[] xformOpOrder = ["xformOp:rotateXYZ"]
}
"#,
        );
        // along Z, rotate X 90 lays it along -Y, rotate Z 90 turns -Y into +X
        let bounds = world_bounds(&scene, &[RenderPurpose::Default]);
        assert_bounds(&bounds, [-5.0, -1.0, -1.0], [5.0, 1.0, 1.0]);
    }

    #[test]
    fn test_capsule_and_plane_axes() {
        let scene = scene(
            r#"#usda 1.0
def Capsule "Pill"
{
    uniform token axis = "Y"
    double height = 2
    double radius = 0.5
}

def Plane "Floor"
{
    uniform token axis = "Y"
    double width = 8
    double length = 4
}
"#,
        );
        let pill = local_bounds(scene.prim_at_path("/Pill").unwrap()).unwrap();
        assert_bounds(&pill, [-0.5, -1.5, -0.5], [0.5, 1.5, 0.5]);
        let floor = local_bounds(scene.prim_at_path("/Floor").unwrap()).unwrap();
        assert_bounds(&floor, [-4.0, 0.0, -2.0], [4.0, 0.0, 2.0]);
    }

    #[test]
    fn test_empty_scene() {
        let scene = scene("#usda 1.0\ndef Xform \"Empty\"\n{\n}\n");
        assert!(world_bounds(&scene, &[RenderPurpose::Default]).is_empty());
    }
}
