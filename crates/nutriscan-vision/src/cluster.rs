use crate::{BBox, Detection};

pub const DEFAULT_CLUSTER_IOU: f64 = 0.3;

/// Detections believed to be one physical item.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub class_id: i32,
    pub confidence: f32,
    pub bbox: BBox,
    pub members: usize,
}

impl Cluster {
    fn seed(d: &Detection) -> Self {
        Self { class_id: d.class_id, confidence: d.confidence, bbox: d.bbox, members: 1 }
    }

    fn absorb(&mut self, d: &Detection) {
        self.confidence = self.confidence.max(d.confidence);
        self.bbox = self.bbox.enclose(&d.bbox);
        self.members += 1;
    }

    fn accepts(&self, d: &Detection, iou_th: f64) -> bool {
        self.class_id == d.class_id && self.bbox.iou(&d.bbox) > iou_th
    }
}

/// Greedy first-fit merge.
///
/// Detections are visited by descending confidence (stable, so equal
/// confidences keep discovery order). Each one joins the first existing
/// cluster, in creation order, with the same class and IoU strictly above
/// `iou_th`; otherwise it starts a new cluster. The cluster's box grows as
/// members join, and later candidates are compared against the grown box.
pub fn cluster_detections(dets: &[Detection], iou_th: f64) -> Vec<Cluster> {
    let mut order: Vec<usize> = (0..dets.len()).collect();
    order.sort_by(|&a, &b| dets[b].confidence.total_cmp(&dets[a].confidence));

    let mut clusters: Vec<Cluster> = Vec::new();
    for i in order {
        let d = &dets[i];
        match clusters.iter().position(|c| c.accepts(d, iou_th)) {
            Some(k) => clusters[k].absorb(d),
            None => clusters.push(Cluster::seed(d)),
        }
    }
    clusters
}
