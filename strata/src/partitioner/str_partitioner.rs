use super::Partitioner;
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::geometry::{GeometryError, Point};
use crate::index::rtree::slab_count;

/// Sort-Tile-Recursive spatial partitioning.
///
/// The partitioner is fitted on a sample of points: the sample is sorted and
/// cut into slabs along the first axis, each slab is sorted and cut along
/// the next axis, and so on until exactly `num_partitions` cells exist (or
/// one cell per sampled point, if the sample is smaller). Cells hold
/// near-equal shares of the sample and are spatially contiguous.
///
/// Every point is then assigned by descending the recorded slab boundaries,
/// so points outside the sampled extent still land in a border cell.
///
/// # Examples
///
/// ```rust
/// use strata::geometry::Point;
/// use strata::partitioner::{Partitioner, StrPartitioner};
///
/// let sample: Vec<Point> = (0..100).map(|i| Point::from([(i % 10) as f64, (i / 10) as f64])).collect();
/// let partitioner = StrPartitioner::build(sample, 4).unwrap();
/// assert_eq!(partitioner.num_partitions(), 4);
/// assert_eq!(partitioner.partition_of(&Point::from([0.0, 0.0])).unwrap(), 0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct StrPartitioner {
    root: Cut,
    dim: usize,
    cells: usize,
}

#[derive(Clone, Debug, PartialEq)]
enum Cut {
    Cell(usize),
    Split {
        axis: usize,
        // inclusive upper coordinate of every slab but the last
        uppers: Vec<f64>,
        children: Vec<Cut>,
    },
}

impl StrPartitioner {
    /// Fits the slab boundaries to `sample`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for an empty or zero-dimensional
    /// sample and `DimensionMismatch` if the sample points disagree on their
    /// dimension.
    pub fn build(sample: Vec<Point>, num_partitions: usize) -> StrataResult<StrPartitioner> {
        let dim = match sample.first() {
            Some(first) if first.dim() > 0 => first.dim(),
            _ => {
                log::error!("STR partitioning needs a non-empty sample of points");
                return Err(StrataError::new(
                    "STR partitioning needs a non-empty sample of points",
                    ErrorKind::InvalidConfiguration,
                ));
            }
        };
        if let Some(bad) = sample.iter().find(|p| p.dim() != dim) {
            return Err(GeometryError::DimensionMismatch {
                expected: dim,
                actual: bad.dim(),
            }
            .into());
        }

        let cells = num_partitions.max(1).min(sample.len());
        let sample_size = sample.len();
        let mut next_id = 0;
        let root = split(sample, cells, 0, dim, &mut next_id);

        log::debug!(
            "STR partitioner fitted {} cells over {} sampled points in {} dimensions",
            next_id,
            sample_size,
            dim
        );
        Ok(StrPartitioner {
            root,
            dim,
            cells: next_id,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }
}

impl Partitioner<Point> for StrPartitioner {
    fn num_partitions(&self) -> usize {
        self.cells
    }

    fn partition_of(&self, point: &Point) -> StrataResult<usize> {
        if point.dim() != self.dim {
            return Err(GeometryError::DimensionMismatch {
                expected: self.dim,
                actual: point.dim(),
            }
            .into());
        }

        let mut cut = &self.root;
        loop {
            match cut {
                Cut::Cell(id) => return Ok(*id),
                Cut::Split {
                    axis,
                    uppers,
                    children,
                } => {
                    let c = point.coord(*axis);
                    let slab = uppers.partition_point(|upper| *upper < c);
                    cut = &children[slab];
                }
            }
        }
    }
}

fn split(mut points: Vec<Point>, cells: usize, axis: usize, dim: usize, next_id: &mut usize) -> Cut {
    if cells <= 1 {
        let id = *next_id;
        *next_id += 1;
        return Cut::Cell(id);
    }

    // an axis on which every point agrees cannot separate them, so cut on
    // the next axis with some extent; if only earlier axes have one, cut
    // every cell on the first of those
    let spread = |axis: usize| {
        let (low, high) = points.iter().map(|p| p.coord(axis)).fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(low, high), c| (low.min(c), high.max(c)),
        );
        low < high
    };
    let (axis, slabs) = match (axis..dim).find(|a| spread(*a)) {
        Some(a) if a + 1 < dim => (a, slab_count(cells, dim - a).min(cells)),
        Some(a) => (a, cells),
        None => ((0..axis).find(|a| spread(*a)).unwrap_or(axis.min(dim - 1)), cells),
    };
    points.sort_by(|a, b| a.coord(axis).total_cmp(&b.coord(axis)));

    let total = points.len();
    let base = cells / slabs;
    let extra = cells % slabs;
    let mut uppers = Vec::with_capacity(slabs - 1);
    let mut children = Vec::with_capacity(slabs);
    let mut rest = points;
    let mut consumed = 0;
    let mut cells_so_far = 0;
    for slab in 0..slabs {
        let slab_cells = base + usize::from(slab < extra);
        cells_so_far += slab_cells;
        // each slab gets a share of points proportional to its cells
        let end = cells_so_far * total / cells;
        let tail = rest.split_off((end - consumed).min(rest.len()));
        let chunk = std::mem::replace(&mut rest, tail);
        consumed = end;

        if slab + 1 < slabs {
            uppers.push(chunk.last().map(|p| p.coord(axis)).unwrap_or(f64::NEG_INFINITY));
        }
        children.push(split(chunk, slab_cells, axis + 1, dim, next_id));
    }

    Cut::Split {
        axis,
        uppers,
        children,
    }
}
