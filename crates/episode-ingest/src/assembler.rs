//! Scene assembly: objects, receivers and rays of one run

use crate::{IngestError, Result};
use episode_store::{InsiteObject, Ray, Receiver, Scene};
use insite_parsing::{ObjectFile, P2mCir, P2mPaths};
use nalgebra::Point3;
use tracing::debug;

/// Builds one [`Scene`] per run.
///
/// Every antenna-equipped object consumes the next receiver slot (1-based
/// index into the paths and CIR files), whether or not a receiver ends up
/// attached to it. Slots are counted per run.
#[derive(Debug)]
pub struct SceneAssembler<'a> {
    antennas: &'a [String],
    next_slot: usize,
}

impl<'a> SceneAssembler<'a> {
    pub fn new(antennas: &'a [String]) -> Self {
        Self {
            antennas,
            next_slot: 0,
        }
    }

    /// Receiver slots consumed so far
    pub fn slots_used(&self) -> usize {
        self.next_slot
    }

    pub fn assemble(
        &mut self,
        objects: &ObjectFile,
        paths: &P2mPaths,
        cir: &P2mCir,
    ) -> Result<Scene> {
        let mut scene = Scene::default();

        for group in objects {
            for structure in group {
                let has_antenna = self.antennas.iter().any(|a| *a == structure.name);
                for sub_structure in structure {
                    let vertices: Vec<Point3<f64>> = sub_structure
                        .as_vertex_array()
                        .into_iter()
                        .map(Point3::from)
                        .collect();
                    let mut object = InsiteObject::from_vertices(&structure.name, vertices)
                        .map_err(|source| IngestError::Geometry {
                            name: structure.name.clone(),
                            source,
                        })?;

                    if has_antenna {
                        self.next_slot += 1;
                        object.receiver = build_receiver(self.next_slot, &object, paths, cir)?;
                        if object.receiver.is_none() {
                            debug!(
                                "No power reached {} (receiver {}), receiver omitted",
                                object.name, self.next_slot
                            );
                        }
                    }

                    scene.objects.push(object);
                }
            }
        }

        Ok(scene)
    }
}

/// `None` when the ray tracer reports no received power for slot `rx`
fn build_receiver(
    rx: usize,
    object: &InsiteObject,
    paths: &P2mPaths,
    cir: &P2mCir,
) -> Result<Option<Receiver>> {
    let Some(total_received_power) = paths.total_received_power(rx) else {
        return Ok(None);
    };

    Ok(Some(Receiver {
        total_received_power,
        mean_time_of_arrival: paths.mean_time_of_arrival(rx).unwrap_or_default(),
        position: object.position,
        rays: build_rays(rx, paths, cir)?,
    }))
}

fn build_rays(rx: usize, paths: &P2mPaths, cir: &P2mCir) -> Result<Vec<Ray>> {
    let departures = paths.departure_angles(rx);
    let arrivals = paths.arrival_angles(rx);
    let gains = paths.path_gains(rx);
    let times = paths.arrival_times(rx);
    let interactions = paths.interactions(rx);
    let phases = cir.phases(rx);

    let misaligned = |detail: String| IngestError::RayDataMisaligned {
        receiver: rx,
        detail,
    };

    let n = departures.len();
    let lengths = [
        ("arrival angles", arrivals.len()),
        ("path gains", gains.len()),
        ("arrival times", times.len()),
        ("interactions", interactions.len()),
        ("phases", phases.len()),
    ];
    if let Some((what, len)) = lengths.iter().find(|(_, len)| *len != n) {
        return Err(misaligned(format!("{} rays but {} {}", n, len, what)));
    }

    let mut rays = Vec::with_capacity(n);
    for (i, ((((departure, arrival), gain), time), interactions)) in departures
        .into_iter()
        .zip(arrivals)
        .zip(gains)
        .zip(times)
        .zip(interactions)
        .enumerate()
    {
        let interaction_positions = paths
            .interaction_positions_as_string(rx, i + 1)
            .ok_or_else(|| misaligned(format!("no interaction positions for ray {}", i + 1)))?;

        rays.push(Ray {
            departure_elevation: departure.0,
            departure_azimuth: departure.1,
            arrival_elevation: arrival.0,
            arrival_azimuth: arrival.1,
            path_gain: gain,
            time_of_arrival: time,
            phase_degrees: phases[i],
            interactions,
            interaction_positions,
        });
    }

    Ok(rays)
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Minimal simulator outputs shared by the assembler and driver tests

    /// Two cars and a building; each car is one box face
    pub const OBJECTS: &str = "begin_<city> Random line
begin_<structure_group> cars
begin_<structure> car1
begin_<sub_structure> body
begin_<face> top
nVertices 4
0 0 1.5
4 0 1.5
4 2 1.5
0 2 0
end_<face>
end_<sub_structure>
end_<structure>
begin_<structure> car2
begin_<sub_structure> body
begin_<face> top
nVertices 3
10 0 0
12 0 0
12 4 1
end_<face>
end_<sub_structure>
end_<structure>
end_<structure_group>
begin_<structure_group> buildings
begin_<structure> building
begin_<sub_structure> walls
begin_<face> north
nVertices 3
-5 -5 0
5 -5 0
5 5 20
end_<face>
end_<sub_structure>
end_<structure>
end_<structure_group>
end_<city>
";

    /// Receiver 1 gets two paths, receiver 2 none
    pub const PATHS: &str = "# Receiver Set:Rx
# <number of receivers>
2
# <receiver number> <number of paths>
1 2
# <received power (dBm)> <mean time of arrival (s)> <delay spread (s)>
-75.5 3.1e-07 1.2e-09
# path 1
1 0 -76.0 3.0e-07 90.0 10.0 91.0 190.0
Tx-Rx
0 0 5
2 1 1.5
# path 2
2 1 -85.0 3.4e-07 85.0 20.0 95.0 200.0
Tx-R-Rx
0 0 5
3 3 0
2 1 1.5
2 0
";

    pub const CIR: &str = "# <number of receivers>
2
# <receiver number> <number of paths>
1 2
1 45.0 3.0e-07 2.5e-11
2 -90.0 3.4e-07 3.2e-12
2 0
";
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn parsed() -> (ObjectFile, P2mPaths, P2mCir) {
        (
            ObjectFile::parse(OBJECTS).unwrap(),
            P2mPaths::parse(PATHS).unwrap(),
            P2mCir::parse(CIR).unwrap(),
        )
    }

    fn antennas(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_objects_without_antennas() {
        let (objects, paths, cir) = parsed();
        let mut assembler = SceneAssembler::new(&[]);
        let scene = assembler.assemble(&objects, &paths, &cir).unwrap();

        let names: Vec<&str> = scene.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["car1", "car2", "building"]);
        assert!(scene.objects.iter().all(|o| o.receiver.is_none()));
        assert_eq!(assembler.slots_used(), 0);
        assert_eq!(scene.study_area, Scene::default().study_area);
    }

    #[test]
    fn test_object_geometry() {
        let (objects, paths, cir) = parsed();
        let scene = SceneAssembler::new(&[])
            .assemble(&objects, &paths, &cir)
            .unwrap();
        let car1 = &scene.objects[0];
        assert_eq!(car1.vertices.len(), 4);
        assert_eq!(car1.position, Point3::new(2.0, 1.0, 0.75));
        assert_eq!(car1.dimension, nalgebra::Vector3::new(4.0, 2.0, 1.5));
    }

    #[test]
    fn test_receiver_with_rays() {
        let (objects, paths, cir) = parsed();
        let names = antennas(&["car1"]);
        let scene = SceneAssembler::new(&names)
            .assemble(&objects, &paths, &cir)
            .unwrap();

        let car1 = &scene.objects[0];
        let receiver = car1.receiver.as_ref().unwrap();
        assert_eq!(receiver.total_received_power, -75.5);
        assert_eq!(receiver.mean_time_of_arrival, 3.1e-7);
        assert_eq!(receiver.position, car1.position);
        assert_eq!(receiver.rays.len(), 2);

        let ray = &receiver.rays[1];
        assert_eq!(ray.departure_elevation, 95.0);
        assert_eq!(ray.departure_azimuth, 200.0);
        assert_eq!(ray.arrival_elevation, 85.0);
        assert_eq!(ray.arrival_azimuth, 20.0);
        assert_eq!(ray.path_gain, -85.0);
        assert_eq!(ray.time_of_arrival, 3.4e-7);
        assert_eq!(ray.phase_degrees, -90.0);
        assert_eq!(ray.interactions, vec!["Tx", "R", "Rx"]);
        assert_eq!(ray.interaction_positions, "0 0 5\n3 3 0\n2 1 1.5");
    }

    #[test]
    fn test_slot_without_power_still_consumed() {
        let (objects, paths, cir) = parsed();
        // car1 takes slot 1, car2 takes slot 2 which received nothing
        let names = antennas(&["car1", "car2"]);
        let mut assembler = SceneAssembler::new(&names);
        let scene = assembler.assemble(&objects, &paths, &cir).unwrap();

        assert!(scene.objects[0].receiver.is_some());
        assert_eq!(scene.objects[1].name, "car2");
        assert!(scene.objects[1].receiver.is_none());
        assert_eq!(assembler.slots_used(), 2);
    }

    #[test]
    fn test_slot_order_follows_object_order() {
        let (objects, paths, cir) = parsed();
        // Only car2 is equipped: it takes slot 1 and gets receiver 1's paths
        let names = antennas(&["car2"]);
        let scene = SceneAssembler::new(&names)
            .assemble(&objects, &paths, &cir)
            .unwrap();

        assert!(scene.objects[0].receiver.is_none());
        let receiver = scene.objects[1].receiver.as_ref().unwrap();
        assert_eq!(receiver.rays.len(), 2);
        assert_eq!(receiver.position, scene.objects[1].position);
    }

    #[test]
    fn test_phase_count_mismatch() {
        let (objects, paths, _) = parsed();
        let cir = P2mCir::parse("1\n1 1\n1 45.0 3.0e-07 2.5e-11\n").unwrap();
        let names = antennas(&["car1"]);
        let err = SceneAssembler::new(&names)
            .assemble(&objects, &paths, &cir)
            .unwrap_err();
        assert!(matches!(err, IngestError::RayDataMisaligned { receiver: 1, .. }));
        assert!(err.is_data_corruption());
    }
}
