//! 查找表
//!
//! 一维或多维的规则网格查找表，按轴做（多）线性插值，超出范围时夹到边界。
//! 数据按行主序存放，最后一个轴变化最快。

use crate::core::{KernelError, KernelResult};

#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    axes: Vec<Vec<f64>>,
    data: Vec<f64>,
}

impl LookupTable {
    pub fn new_1d(index: Vec<f64>, values: Vec<f64>) -> KernelResult<Self> {
        Self::new(vec![index], values)
    }

    pub fn new(axes: Vec<Vec<f64>>, data: Vec<f64>) -> KernelResult<Self> {
        if axes.is_empty() || axes.iter().any(Vec::is_empty) {
            return Err(KernelError::Parameter {
                name: "lookup table".to_string(),
                reason: "every axis needs at least one point".to_string(),
            });
        }
        let expected: usize = axes.iter().map(Vec::len).product();
        if expected != data.len() {
            return Err(KernelError::Parameter {
                name: "lookup table".to_string(),
                reason: format!("expected {expected} data values, got {}", data.len()),
            });
        }
        Ok(Self { axes, data })
    }

    /// 解析一维表文本 `"x0,y0;x1,y1;..."`
    pub fn parse_1d(text: &str) -> KernelResult<Self> {
        let mut index = Vec::new();
        let mut values = Vec::new();
        for row in text.split(';').map(str::trim).filter(|r| !r.is_empty()) {
            let mut cols = row.split(',').map(str::trim);
            let (Some(x), Some(y), None) = (cols.next(), cols.next(), cols.next()) else {
                return Err(KernelError::Parameter {
                    name: "lookup table".to_string(),
                    reason: format!("row `{row}` must have exactly two columns"),
                });
            };
            let num = |s: &str| {
                s.parse::<f64>().map_err(|_| KernelError::Parameter {
                    name: "lookup table".to_string(),
                    reason: format!("`{s}` is not a number"),
                })
            };
            index.push(num(x)?);
            values.push(num(y)?);
        }
        Self::new_1d(index, values)
    }

    pub fn dimensions(&self) -> usize {
        self.axes.len()
    }

    pub fn axis(&self, dim: usize) -> Option<&[f64]> {
        self.axes.get(dim).map(Vec::as_slice)
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// 所有轴都严格递增
    pub fn is_ascending(&self) -> bool {
        self.axes.iter().all(|a| a.windows(2).all(|w| w[0] < w[1]))
    }

    /// 一维表按索引升序重排（稳定）；多维表不支持
    pub fn sort(&mut self) -> KernelResult<()> {
        self.ensure_1d("sort")?;
        let mut pairs: Vec<(f64, f64)> = self.axes[0]
            .iter()
            .copied()
            .zip(self.data.iter().copied())
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        (self.axes[0], self.data) = pairs.into_iter().unzip();
        Ok(())
    }

    /// 一维表整体倒序；多维表不支持
    pub fn reverse(&mut self) -> KernelResult<()> {
        self.ensure_1d("reverse")?;
        self.axes[0].reverse();
        self.data.reverse();
        Ok(())
    }

    fn ensure_1d(&self, op: &str) -> KernelResult<()> {
        if self.axes.len() == 1 {
            Ok(())
        } else {
            Err(KernelError::Unsupported(format!(
                "{op} on a {}-D lookup table",
                self.axes.len()
            )))
        }
    }

    /// 某个轴上的区间下标与区间内的比例
    fn locate(axis: &[f64], x: f64) -> (usize, f64) {
        if axis.len() == 1 || x <= axis[0] {
            return (0, 0.0);
        }
        let last = axis.len() - 1;
        if x >= axis[last] {
            return (last - 1, 1.0);
        }
        let i = axis.partition_point(|v| *v <= x).saturating_sub(1).min(last - 1);
        let span = axis[i + 1] - axis[i];
        let t = if span > 0.0 { (x - axis[i]) / span } else { 0.0 };
        (i, t)
    }

    pub fn interpolate_1d(&self, x: f64) -> f64 {
        self.interpolate(&[x])
    }

    /// 多线性插值；`point` 少于维数时缺的坐标按 0 处理
    pub fn interpolate(&self, point: &[f64]) -> f64 {
        let dims = self.axes.len();
        let located: Vec<(usize, f64)> = self
            .axes
            .iter()
            .enumerate()
            .map(|(d, axis)| Self::locate(axis, point.get(d).copied().unwrap_or(0.0)))
            .collect();
        let mut strides = vec![1usize; dims];
        for d in (0..dims.saturating_sub(1)).rev() {
            strides[d] = strides[d + 1] * self.axes[d + 1].len();
        }
        let mut sum = 0.0;
        for corner in 0..(1usize << dims) {
            let mut weight = 1.0;
            let mut offset = 0;
            for d in 0..dims {
                let (i, t) = located[d];
                let upper = (corner >> d) & 1 == 1;
                let idx = if upper { (i + 1).min(self.axes[d].len() - 1) } else { i };
                weight *= if upper { t } else { 1.0 - t };
                offset += idx * strides[d];
            }
            if weight != 0.0 {
                sum += weight * self.data[offset];
            }
        }
        sum
    }
}
