//! 需用系数计算：照明分档、一般负荷 10kVA/40% 规则、空调汇总、服务额定值选取以及双单元合并。
//!
//! 全部为纯函数。VA 一律用整数表示，百分比折算向上取整到整 VA。

use loadcalc_core::load::{
    GeneralLoadSlot, LightingOccupancyType, UnitInformation, UnitLoad,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::ValidationError;

/// 一般负荷中按 100% 计入的第一段。
pub const FIRST_DEMAND_BLOCK_VA: i64 = 10_000;
const REMAINDER_PERCENT: i64 = 40;

/// 单元内单项与合计 VA 的上限。
pub const MAX_UNIT_VA: i64 = 1_000_000_000;
/// 单项台数上限。
pub const MAX_MULTIPLIER: i64 = 100_000;

/// 与内建热水器项冲突的自定义负荷名。
pub const WATER_HEATER_LOAD_NAME: &str = "Water Heater";

/// `va × percent / 100`，向上取整。
#[inline]
pub fn ceil_percent(va: i64, percent: i64) -> i64 {
    let product = va * percent;
    product.div_euclid(100) + i64::from(product.rem_euclid(100) > 0)
}

/// 标签后缀：台数大于 1 时为 ` (N):`，否则为 `:`。
pub fn multiplier_suffix(multiplier: i64) -> String {
    if multiplier <= 1 {
        ":".to_string()
    } else {
        format!(" ({multiplier}):")
    }
}

struct TierRule {
    label: &'static str,
    lower: i64,
    upper: Option<i64>,
    percent: i64,
}

const DWELLING_TIERS: [TierRule; 3] = [
    TierRule { label: "   0-3KVA @ 100%:", lower: 0, upper: Some(3_000), percent: 100 },
    TierRule { label: "   3-120KVA @ 35%:", lower: 3_000, upper: Some(120_000), percent: 35 },
    TierRule { label: "   120+KVA @ 25%:", lower: 120_000, upper: None, percent: 25 },
];

const HOTEL_MOTEL_TIERS: [TierRule; 3] = [
    TierRule { label: "   0-20KVA @ 60%:", lower: 0, upper: Some(20_000), percent: 60 },
    TierRule { label: "   20-100KVA @ 50%:", lower: 20_000, upper: Some(100_000), percent: 50 },
    TierRule { label: "   100+KVA @ 35%:", lower: 100_000, upper: None, percent: 35 },
];

const WAREHOUSE_TIERS: [TierRule; 2] = [
    TierRule { label: "   0-12.5KVA @ 100%:", lower: 0, upper: Some(12_500), percent: 100 },
    TierRule { label: "   12.5+KVA @ 50%:", lower: 12_500, upper: None, percent: 50 },
];

pub const LIGHTING_SUBTOTAL_LABEL: &str = "   Lighting Subtotal:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightingTier {
    pub label: &'static str,
    pub va: i64,
}

/// 照明分档结果，行数与标签一一对应。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightingBreakdown {
    pub occupancy: LightingOccupancyType,
    pub tiers: Vec<LightingTier>,
    pub subtotal: i64,
}

impl LightingBreakdown {
    /// 分档行加小计行。
    pub fn rows(&self) -> Vec<(&'static str, i64)> {
        self.tiers
            .iter()
            .map(|tier| (tier.label, tier.va))
            .chain(std::iter::once((LIGHTING_SUBTOTAL_LABEL, self.subtotal)))
            .collect()
    }
}

/// 照明分档。`Other` 不分档，返回 `None`。
pub fn lighting_breakdown(
    occupancy: LightingOccupancyType,
    lighting_va: i64,
) -> Option<LightingBreakdown> {
    let rules: &[TierRule] = match occupancy {
        LightingOccupancyType::Dwelling => &DWELLING_TIERS,
        LightingOccupancyType::HotelAndMotel => &HOTEL_MOTEL_TIERS,
        LightingOccupancyType::Warehouse => &WAREHOUSE_TIERS,
        LightingOccupancyType::Other => return None,
    };
    let tiers: Vec<LightingTier> = rules
        .iter()
        .map(|rule| {
            let above = (lighting_va - rule.lower).max(0);
            let portion = match rule.upper {
                Some(upper) => above.min(upper - rule.lower),
                None => above,
            };
            LightingTier {
                label: rule.label,
                va: ceil_percent(portion, rule.percent),
            }
        })
        .collect();
    let subtotal = tiers.iter().map(|tier| tier.va).sum();
    Some(LightingBreakdown {
        occupancy,
        tiers,
        subtotal,
    })
}

/// 10kVA/40% 规则的各项中间值。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneralDemand {
    pub total_general_load: i64,
    pub first_10kva: i64,
    pub amount_over_10kva: i64,
    pub remainder_at_40_percent: i64,
    pub subtotal_general_load: i64,
}

pub fn general_demand(total_general_load: i64) -> GeneralDemand {
    let first_10kva = total_general_load.min(FIRST_DEMAND_BLOCK_VA);
    let amount_over_10kva = (total_general_load - FIRST_DEMAND_BLOCK_VA).max(0);
    let remainder_at_40_percent = ceil_percent(amount_over_10kva, REMAINDER_PERCENT);
    GeneralDemand {
        total_general_load,
        first_10kva,
        amount_over_10kva,
        remainder_at_40_percent,
        subtotal_general_load: first_10kva + remainder_at_40_percent,
    }
}

/// 标准服务额定值（A），升序。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRatingTable {
    ratings: Vec<u32>,
}

impl ServiceRatingTable {
    pub const DEFAULT_RATINGS: [u32; 11] = [100, 125, 150, 200, 225, 300, 400, 600, 800, 1000, 1200];

    /// 去重并排序；空列表退回默认表。
    pub fn new(mut ratings: Vec<u32>) -> Self {
        ratings.retain(|rating| *rating > 0);
        ratings.sort_unstable();
        ratings.dedup();
        if ratings.is_empty() {
            return Self::default();
        }
        Self { ratings }
    }

    #[inline]
    pub fn ratings(&self) -> &[u32] {
        &self.ratings
    }

    /// 不小于 `amps` 的最小标准额定值；超出表上限时取向上取整的安培数。
    pub fn rating_for(&self, amps: f64) -> u32 {
        if let Some(rating) = self
            .ratings
            .iter()
            .copied()
            .find(|rating| f64::from(*rating) >= amps)
        {
            return rating;
        }
        let fallback = amps.max(0.0).ceil() as u32;
        warn!(amps, fallback, "服务负荷超出标准额定值表上限");
        fallback
    }
}

impl Default for ServiceRatingTable {
    fn default() -> Self {
        Self {
            ratings: Self::DEFAULT_RATINGS.to_vec(),
        }
    }
}

/// 推导汇总值，快照中以 `Totals` 字段输出，读取时忽略。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Totals {
    pub total_general_load: i64,
    #[serde(rename = "AmountOver10KVA")]
    pub amount_over_10kva: i64,
    #[serde(rename = "First10KVA")]
    pub first_10kva: i64,
    pub remainder_at_40_percent: i64,
    pub subtotal_general_load: i64,
    #[serde(rename = "TotalACLoad")]
    pub total_ac_load: i64,
    pub custom_load: i64,
    pub voltage: u32,
    pub service_load: f64,
    pub service_rating: u32,
}

impl Totals {
    /// 服务计算所用的总 VA（需用后的一般负荷 + 空调 + 自定义）。
    #[inline]
    pub fn service_va(&self) -> i64 {
        self.subtotal_general_load + self.total_ac_load + self.custom_load
    }

    pub fn from_parts(
        total_general_load: i64,
        total_ac_load: i64,
        custom_load: i64,
        voltage: u32,
        ratings: &ServiceRatingTable,
    ) -> Self {
        let demand = general_demand(total_general_load);
        let service_va = demand.subtotal_general_load + total_ac_load + custom_load;
        let service_load = service_amps(service_va, voltage);
        Self {
            total_general_load,
            amount_over_10kva: demand.amount_over_10kva,
            first_10kva: demand.first_10kva,
            remainder_at_40_percent: demand.remainder_at_40_percent,
            subtotal_general_load: demand.subtotal_general_load,
            total_ac_load,
            custom_load,
            voltage,
            service_load,
            service_rating: ratings.rating_for(service_load),
        }
    }
}

/// `va / voltage`，不取整。
#[inline]
pub fn service_amps(va: i64, voltage: u32) -> f64 {
    if voltage == 0 {
        0.0
    } else {
        va as f64 / f64::from(voltage)
    }
}

/// 合并后的负荷项：`va` 为累计的 VA×台数，`multiplier` 为累计台数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedLoad {
    pub name: String,
    pub va: i64,
    pub multiplier: i64,
}

impl CombinedLoad {
    pub fn from_load(load: &UnitLoad) -> Self {
        Self {
            name: load.name.clone(),
            va: load.total(),
            multiplier: load.multiplier,
        }
    }

    pub fn absorb(&mut self, other: &CombinedLoad) {
        self.va += other.va;
        self.multiplier += other.multiplier;
    }

    /// `{name}:` 或 `{name} (N):`。
    pub fn label(&self) -> String {
        format!("{}{}", self.name, multiplier_suffix(self.multiplier))
    }
}

/// 按名称（区分大小写）合并，保持首次出现的顺序。
pub fn merge_by_name<'a, I>(loads: I) -> Vec<CombinedLoad>
where
    I: IntoIterator<Item = &'a CombinedLoad>,
{
    let mut merged: Vec<CombinedLoad> = Vec::new();
    for load in loads {
        match merged.iter_mut().find(|existing| existing.name == load.name) {
            Some(existing) => existing.absorb(load),
            None => merged.push(load.clone()),
        }
    }
    merged
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcSummary {
    pub condenser: i64,
    pub fan_coil: i64,
    pub heating: i64,
    pub heating_units: i64,
    pub electrical_code: String,
}

impl AcSummary {
    #[inline]
    pub fn total(&self) -> i64 {
        self.condenser + self.fan_coil + self.heating
    }
}

/// 报表所需的一份（可能由两个单元合并的）负荷清单。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSheet {
    pub unit_ids: Vec<u32>,
    pub unit_names: Vec<String>,
    pub voltage: u32,
    pub floor_area: i64,
    pub heater: String,
    pub dryer: String,
    pub oven: String,
    pub cooktop: String,
    pub occupancy: LightingOccupancyType,
    /// 除热水器外的 14 个固定项，按报表顺序。
    pub general: Vec<(GeneralLoadSlot, CombinedLoad)>,
    /// 存在名为 "Water Heater" 的自定义负荷时为 `None`。
    pub water_heater: Option<CombinedLoad>,
    pub general_customs: Vec<CombinedLoad>,
    pub ac: AcSummary,
    pub custom_loads: Vec<CombinedLoad>,
}

/// 计算前的输入校验，成功时返回解析后的面积。
pub fn validate_unit(unit: &UnitInformation) -> Result<i64, ValidationError> {
    let floor_area = unit
        .dwelling_area
        .floor_area
        .trim()
        .parse::<u32>()
        .map_err(|_| ValidationError::FloorArea {
            unit: unit.name.clone(),
            value: unit.dwelling_area.floor_area.clone(),
        })?;
    if !UnitInformation::SUPPORTED_VOLTAGES.contains(&unit.voltage) {
        return Err(ValidationError::Voltage {
            unit: unit.name.clone(),
            voltage: unit.voltage,
        });
    }
    let negative = |load: &str| ValidationError::NegativeLoad {
        unit: unit.name.clone(),
        load: load.to_string(),
    };
    let too_large = |load: &str| ValidationError::LoadTooLarge {
        unit: unit.name.clone(),
        load: load.to_string(),
    };
    // 合计受限后，双单元合并与百分比折算不会溢出
    let within = |va: i64| (va <= MAX_UNIT_VA).then_some(va);
    let mut total: i64 = 0;
    for load in unit
        .general_loads
        .all_loads()
        .chain(unit.custom_loads.iter())
    {
        if load.va < 0 || load.multiplier < 0 {
            return Err(negative(&load.name));
        }
        if load.multiplier > MAX_MULTIPLIER {
            return Err(too_large(&load.name));
        }
        total = load
            .checked_total()
            .and_then(within)
            .and_then(|va| total.checked_add(va))
            .and_then(within)
            .ok_or_else(|| too_large(&load.name))?;
    }
    let ac = &unit.ac_loads;
    if ac.condenser < 0 || ac.fan_coil < 0 || ac.heating_unit.heating < 0 {
        return Err(negative("AC Load"));
    }
    if ac.heating_unit.number_of_units > MAX_MULTIPLIER {
        return Err(too_large("Heating Unit"));
    }
    [ac.condenser, ac.fan_coil, ac.heating_unit.heating]
        .into_iter()
        .try_fold(0i64, |sum, va| within(va).and_then(|va| sum.checked_add(va)).and_then(within))
        .ok_or_else(|| too_large("AC Load"))?;
    Ok(i64::from(floor_area))
}

impl LoadSheet {
    pub fn for_unit(unit: &UnitInformation) -> Result<Self, ValidationError> {
        let floor_area = validate_unit(unit)?;
        let loads = &unit.general_loads;
        let general = GeneralLoadSlot::ALL
            .iter()
            .copied()
            .filter(|slot| *slot != GeneralLoadSlot::WaterHeater)
            .map(|slot| {
                let mut combined = CombinedLoad::from_load(loads.slot(slot));
                combined.name = slot.label().to_string();
                (slot, combined)
            })
            .collect();
        let water_heater = (!unit.has_custom_load(WATER_HEATER_LOAD_NAME)).then(|| {
            let mut combined = CombinedLoad::from_load(&loads.water_heater);
            combined.name = GeneralLoadSlot::WaterHeater.label().to_string();
            combined
        });
        let general_customs: Vec<CombinedLoad> =
            loads.customs.iter().map(CombinedLoad::from_load).collect();
        let custom_loads: Vec<CombinedLoad> =
            unit.custom_loads.iter().map(CombinedLoad::from_load).collect();
        let area = &unit.dwelling_area;
        Ok(Self {
            unit_ids: vec![unit.id],
            unit_names: vec![unit.name.clone()],
            voltage: unit.voltage,
            floor_area,
            heater: area.heater.to_string(),
            dryer: area.dryer.to_string(),
            oven: area.oven.to_string(),
            cooktop: area.cooktop.to_string(),
            occupancy: loads.lighting_occupancy_type,
            general,
            water_heater,
            general_customs: merge_by_name(&general_customs),
            ac: AcSummary {
                condenser: unit.ac_loads.condenser,
                fan_coil: unit.ac_loads.fan_coil,
                heating: unit.ac_loads.heating_unit.heating,
                heating_units: unit.ac_loads.heating_unit.number_of_units,
                electrical_code: unit.ac_loads.electrical_code.clone(),
            },
            custom_loads: merge_by_name(&custom_loads),
        })
    }

    /// 双单元合并（可为同一单元的两份）。电压必须一致。
    pub fn combine(
        first: &UnitInformation,
        second: &UnitInformation,
    ) -> Result<Self, ValidationError> {
        let left = Self::for_unit(first)?;
        let right = Self::for_unit(second)?;
        left.merged(right)
    }

    pub fn merged(mut self, other: LoadSheet) -> Result<Self, ValidationError> {
        if self.voltage != other.voltage {
            return Err(ValidationError::VoltageMismatch {
                first: self.unit_names.join(" & "),
                second: other.unit_names.join(" & "),
            });
        }
        self.unit_ids.extend(other.unit_ids);
        self.unit_names.extend(other.unit_names);
        self.floor_area += other.floor_area;
        for (field, extra) in [
            (&mut self.heater, other.heater),
            (&mut self.dryer, other.dryer),
            (&mut self.oven, other.oven),
            (&mut self.cooktop, other.cooktop),
        ] {
            field.push('/');
            field.push_str(&extra);
        }
        for ((_, mine), (_, theirs)) in self.general.iter_mut().zip(other.general.iter()) {
            mine.absorb(theirs);
        }
        self.water_heater = match (self.water_heater.take(), other.water_heater) {
            (Some(mut mine), Some(theirs)) => {
                mine.absorb(&theirs);
                Some(mine)
            }
            (mine, theirs) => mine.or(theirs),
        };
        self.general_customs = merge_by_name(self.general_customs.iter().chain(&other.general_customs));
        self.ac.condenser += other.ac.condenser;
        self.ac.fan_coil += other.ac.fan_coil;
        self.ac.heating += other.ac.heating;
        self.ac.heating_units += other.ac.heating_units;
        self.custom_loads = merge_by_name(self.custom_loads.iter().chain(&other.custom_loads));
        Ok(self)
    }

    #[inline]
    pub fn is_combo(&self) -> bool {
        self.unit_ids.len() > 1
    }

    /// 未分档的照明 VA。
    pub fn lighting_va(&self) -> i64 {
        self.general
            .iter()
            .find(|(slot, _)| *slot == GeneralLoadSlot::Lighting)
            .map(|(_, load)| load.va)
            .unwrap_or(0)
    }

    pub fn lighting_breakdown(&self) -> Option<LightingBreakdown> {
        lighting_breakdown(self.occupancy, self.lighting_va())
    }

    /// 一般负荷合计（照明按原值计入）。
    pub fn total_general_load(&self) -> i64 {
        let fixed: i64 = self.general.iter().map(|(_, load)| load.va).sum();
        let water_heater = self.water_heater.as_ref().map_or(0, |load| load.va);
        let customs: i64 = self.general_customs.iter().map(|load| load.va).sum();
        fixed + water_heater + customs
    }

    pub fn custom_load(&self) -> i64 {
        self.custom_loads.iter().map(|load| load.va).sum()
    }

    /// 10kVA/40% 规则只在合并后的总量上应用一次。
    pub fn totals(&self, ratings: &ServiceRatingTable) -> Totals {
        Totals::from_parts(
            self.total_general_load(),
            self.ac.total(),
            self.custom_load(),
            self.voltage,
            ratings,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadcalc_core::load::{ApplianceType, UnitLoad};
    use proptest::prelude::*;

    fn bare_unit(id: u32, name: &str) -> UnitInformation {
        let mut unit = UnitInformation::new(id, name);
        for slot in GeneralLoadSlot::ALL {
            unit.general_loads.slot_mut(slot).va = 0;
        }
        unit
    }

    #[test]
    fn dwelling_breakdown_matches_reference_values() {
        let breakdown = lighting_breakdown(LightingOccupancyType::Dwelling, 150_000)
            .expect("住宅照明应分档");
        let values: Vec<i64> = breakdown.tiers.iter().map(|tier| tier.va).collect();
        assert_eq!(values, vec![3_000, 40_950, 7_500]);
        assert_eq!(breakdown.subtotal, 51_450);
        let rows = breakdown.rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[3], (LIGHTING_SUBTOTAL_LABEL, 51_450));
        assert_eq!(rows[0].0, "   0-3KVA @ 100%:");
    }

    #[test]
    fn hotel_and_warehouse_breakdowns() {
        let hotel = lighting_breakdown(LightingOccupancyType::HotelAndMotel, 25_001)
            .expect("旅馆照明应分档");
        assert_eq!(
            hotel.tiers.iter().map(|t| t.va).collect::<Vec<_>>(),
            vec![12_000, 2_501, 0]
        );
        let warehouse = lighting_breakdown(LightingOccupancyType::Warehouse, 13_001)
            .expect("仓库照明应分档");
        assert_eq!(warehouse.rows().len(), 3);
        assert_eq!(warehouse.subtotal, 12_500 + 251);
        assert!(lighting_breakdown(LightingOccupancyType::Other, 13_001).is_none());
    }

    proptest! {
        #[test]
        fn tier_sums_match_closed_form(lighting in 0i64..1_000_000) {
            let ceil = |va: i64, pct: i64| (va * pct + 99) / 100;

            let dwelling = lighting_breakdown(LightingOccupancyType::Dwelling, lighting).expect("该用途有分档");
            let expected = lighting.min(3_000)
                + ceil((lighting - 3_000).clamp(0, 117_000), 35)
                + ceil((lighting - 120_000).max(0), 25);
            prop_assert_eq!(dwelling.subtotal, expected);
            prop_assert_eq!(dwelling.tiers.iter().map(|t| t.va).sum::<i64>(), dwelling.subtotal);

            let hotel = lighting_breakdown(LightingOccupancyType::HotelAndMotel, lighting).expect("该用途有分档");
            let expected = ceil(lighting.min(20_000), 60)
                + ceil((lighting - 20_000).clamp(0, 80_000), 50)
                + ceil((lighting - 100_000).max(0), 35);
            prop_assert_eq!(hotel.subtotal, expected);

            let warehouse = lighting_breakdown(LightingOccupancyType::Warehouse, lighting).expect("该用途有分档");
            let expected = lighting.min(12_500) + ceil((lighting - 12_500).max(0), 50);
            prop_assert_eq!(warehouse.subtotal, expected);
            prop_assert_eq!(warehouse.rows().len(), 3);
        }
    }

    #[test]
    fn general_demand_boundary_at_ten_kva() {
        let at = general_demand(10_000);
        assert_eq!(at.amount_over_10kva, 0);
        assert_eq!(at.subtotal_general_load, 10_000);

        let below = general_demand(4_000);
        assert_eq!(below.first_10kva, 4_000);
        assert_eq!(below.remainder_at_40_percent, 0);

        let above = general_demand(10_003);
        assert_eq!(above.amount_over_10kva, 3);
        // ceil(1.2) = 2
        assert_eq!(above.remainder_at_40_percent, 2);
        assert_eq!(above.subtotal_general_load, 10_002);
    }

    #[test]
    fn end_to_end_service_rating() {
        let mut unit = bare_unit(1, "A");
        unit.general_loads.lighting.va = 12_000;
        unit.ac_loads.condenser = 3_000;
        unit.dwelling_area.floor_area = "4000".to_string();

        let totals = LoadSheet::for_unit(&unit)
            .expect("有效输入")
            .totals(&ServiceRatingTable::default());
        assert_eq!(totals.total_general_load, 12_000);
        assert_eq!(totals.first_10kva, 10_000);
        assert_eq!(totals.remainder_at_40_percent, 800);
        assert_eq!(totals.subtotal_general_load, 10_800);
        assert_eq!(totals.total_ac_load, 3_000);
        assert_eq!(totals.custom_load, 0);
        assert!((totals.service_load - 57.5).abs() < 1e-12);
        assert_eq!(totals.service_rating, 100);
        assert_eq!(totals.service_va(), 13_800);
    }

    #[test]
    fn rating_table_snaps_up_and_handles_overflow() {
        let table = ServiceRatingTable::new(vec![200, 100, 0, 100, 150]);
        assert_eq!(table.ratings(), &[100, 150, 200]);
        assert_eq!(table.rating_for(100.0), 100);
        assert_eq!(table.rating_for(100.01), 150);
        assert_eq!(table.rating_for(250.2), 251);
        assert_eq!(ServiceRatingTable::new(Vec::new()), ServiceRatingTable::default());
    }

    #[test]
    fn water_heater_custom_load_suppresses_slot() {
        let mut unit = bare_unit(1, "A");
        unit.general_loads.water_heater.va = 4_500;
        let sheet = LoadSheet::for_unit(&unit).expect("有效输入");
        assert_eq!(sheet.water_heater.as_ref().map(|l| l.va), Some(4_500));
        assert_eq!(sheet.total_general_load(), 4_500);

        unit.custom_loads.push(UnitLoad::new("Water Heater", 4_500, 1));
        let sheet = LoadSheet::for_unit(&unit).expect("有效输入");
        assert!(sheet.water_heater.is_none());
        assert_eq!(sheet.total_general_load(), 0);
        assert_eq!(sheet.custom_load(), 4_500);
    }

    #[test]
    fn combining_units_merges_custom_loads_by_name() {
        let mut first = bare_unit(1, "A");
        first.custom_loads.push(UnitLoad::new("Fireplace", 500, 1));
        first.custom_loads.push(UnitLoad::new("Spa", 1_000, 1));
        let mut second = bare_unit(2, "B");
        second.custom_loads.push(UnitLoad::new("Fireplace", 300, 2));
        second.custom_loads.push(UnitLoad::new("fireplace", 10, 1));

        let sheet = LoadSheet::combine(&first, &second).expect("可以合并");
        assert_eq!(
            sheet.custom_loads,
            vec![
                CombinedLoad { name: "Fireplace".into(), va: 1_100, multiplier: 3 },
                CombinedLoad { name: "Spa".into(), va: 1_000, multiplier: 1 },
                CombinedLoad { name: "fireplace".into(), va: 10, multiplier: 1 },
            ]
        );
        assert_eq!(sheet.custom_loads[0].label(), "Fireplace (3):");
        assert_eq!(sheet.custom_loads[1].label(), "Spa:");
        assert!(sheet.is_combo());
    }

    #[test]
    fn combining_applies_general_demand_once() {
        let mut first = bare_unit(1, "A");
        first.general_loads.lighting.va = 8_000;
        first.dwelling_area.floor_area = "1000".into();
        first.dwelling_area.heater = ApplianceType::Gas;
        first.ac_loads.condenser = 2_000;
        first.ac_loads.heating_unit.heating = 500;
        let mut second = bare_unit(2, "B");
        second.general_loads.lighting.va = 6_000;
        second.dwelling_area.floor_area = "800".into();
        second.dwelling_area.heater = ApplianceType::Electric;
        second.ac_loads.fan_coil = 300;

        let sheet = LoadSheet::combine(&first, &second).expect("可以合并");
        assert_eq!(sheet.floor_area, 1_800);
        assert_eq!(sheet.heater, "Gas/Electric");
        assert_eq!(sheet.dryer, "NA/NA");
        assert_eq!(sheet.lighting_va(), 14_000);
        assert_eq!(sheet.ac.total(), 2_800);
        assert_eq!(sheet.ac.heating_units, 2);

        let totals = sheet.totals(&ServiceRatingTable::default());
        assert_eq!(totals.total_general_load, 14_000);
        assert_eq!(totals.remainder_at_40_percent, 1_600);
        assert_eq!(totals.subtotal_general_load, 11_600);
    }

    #[test]
    fn combining_rejects_voltage_mismatch() {
        let first = bare_unit(1, "A");
        let mut second = bare_unit(2, "B");
        second.voltage = 208;
        assert!(matches!(
            LoadSheet::combine(&first, &second),
            Err(ValidationError::VoltageMismatch { .. })
        ));
    }

    #[test]
    fn validation_runs_before_computation() {
        let mut unit = bare_unit(1, "A");
        unit.dwelling_area.floor_area = "12a".into();
        assert!(matches!(
            LoadSheet::for_unit(&unit),
            Err(ValidationError::FloorArea { value, .. }) if value == "12a"
        ));

        unit.dwelling_area.floor_area = " 1200 ".into();
        assert_eq!(validate_unit(&unit), Ok(1_200));

        unit.voltage = 120;
        assert!(matches!(validate_unit(&unit), Err(ValidationError::Voltage { voltage: 120, .. })));

        unit.voltage = 208;
        unit.general_loads.dishwasher.va = -1;
        assert!(matches!(
            validate_unit(&unit),
            Err(ValidationError::NegativeLoad { load, .. }) if load == "Dishwasher"
        ));
    }

    #[test]
    fn oversized_loads_are_rejected_before_summing() {
        let mut unit = bare_unit(1, "A");
        unit.general_loads.lighting.va = 4_000_000_000_000_000_000;
        unit.general_loads.lighting.multiplier = 3;
        assert!(matches!(
            LoadSheet::for_unit(&unit),
            Err(ValidationError::LoadTooLarge { load, .. }) if load == GeneralLoadSlot::Lighting.label()
        ));

        unit.general_loads.lighting.va = 600_000_000;
        unit.general_loads.lighting.multiplier = 1;
        assert!(validate_unit(&unit).is_ok());
        unit.general_loads.dryer.va = 600_000_000;
        unit.general_loads.dryer.multiplier = 1;
        assert!(matches!(
            validate_unit(&unit),
            Err(ValidationError::LoadTooLarge { load, .. }) if load == "Dryer"
        ));

        unit.general_loads.dryer.va = 0;
        unit.general_loads.dryer.multiplier = i64::MAX;
        assert!(matches!(validate_unit(&unit), Err(ValidationError::LoadTooLarge { .. })));

        unit.general_loads.dryer.multiplier = 1;
        unit.ac_loads.condenser = i64::MAX;
        unit.ac_loads.fan_coil = 1;
        assert!(matches!(
            validate_unit(&unit),
            Err(ValidationError::LoadTooLarge { load, .. }) if load == "AC Load"
        ));
    }

    #[test]
    fn ceil_percent_rounds_up_to_whole_va() {
        assert_eq!(ceil_percent(117_000, 35), 40_950);
        assert_eq!(ceil_percent(1, 35), 1);
        assert_eq!(ceil_percent(0, 35), 0);
        assert_eq!(ceil_percent(2_000, 40), 800);
        assert_eq!(multiplier_suffix(1), ":");
        assert_eq!(multiplier_suffix(0), ":");
        assert_eq!(multiplier_suffix(4), " (4):");
    }
}
