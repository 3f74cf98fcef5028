//! 住宅单元与建筑的负荷数据模型。字段名与快照 JSON 保持一致（PascalCase）。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 单项负荷：每台视在功率（VA）与台数。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UnitLoad {
    pub name: String,
    #[serde(rename = "VA")]
    pub va: i64,
    pub multiplier: i64,
}

impl UnitLoad {
    pub fn new(name: impl Into<String>, va: i64, multiplier: i64) -> Self {
        Self {
            name: name.into(),
            va,
            multiplier,
        }
    }

    /// 参与汇总的总功率 = VA × 台数。
    #[inline]
    pub fn total(&self) -> i64 {
        self.va * self.multiplier
    }

    /// 溢出时返回 `None`。
    #[inline]
    pub fn checked_total(&self) -> Option<i64> {
        self.va.checked_mul(self.multiplier)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LightingOccupancyType {
    #[default]
    Dwelling,
    HotelAndMotel,
    Warehouse,
    Other,
}

/// 一般负荷中的固定项。顺序即报表中的行顺序。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneralLoadSlot {
    Lighting,
    SmallAppliance,
    Laundry,
    Bathroom,
    Dishwasher,
    MicrowaveOven,
    GarbageDisposal,
    BathroomFans,
    GarageDoorOpener,
    Dryer,
    Range,
    Refrigerator,
    Oven,
    Cooktop,
    WaterHeater,
}

impl GeneralLoadSlot {
    pub const ALL: [GeneralLoadSlot; 15] = [
        GeneralLoadSlot::Lighting,
        GeneralLoadSlot::SmallAppliance,
        GeneralLoadSlot::Laundry,
        GeneralLoadSlot::Bathroom,
        GeneralLoadSlot::Dishwasher,
        GeneralLoadSlot::MicrowaveOven,
        GeneralLoadSlot::GarbageDisposal,
        GeneralLoadSlot::BathroomFans,
        GeneralLoadSlot::GarageDoorOpener,
        GeneralLoadSlot::Dryer,
        GeneralLoadSlot::Range,
        GeneralLoadSlot::Refrigerator,
        GeneralLoadSlot::Oven,
        GeneralLoadSlot::Cooktop,
        GeneralLoadSlot::WaterHeater,
    ];

    /// 报表标签（不含倍数后缀与冒号）。照明标签依赖规范条款，由报表层拼接。
    pub fn label(self) -> &'static str {
        match self {
            GeneralLoadSlot::Lighting => "General Lighting (Floor Area x 3VA/ft²)",
            GeneralLoadSlot::SmallAppliance => "Small Appliance (3-20ACK by CEC 210.11)",
            GeneralLoadSlot::Laundry => "Laundry (1-20ACKT by CEC 210.11)",
            GeneralLoadSlot::Bathroom => "Bathroom (1-20ACKT by CEC 210.11)",
            GeneralLoadSlot::Dishwasher => "Dishwasher",
            GeneralLoadSlot::MicrowaveOven => "Microwave",
            GeneralLoadSlot::GarbageDisposal => "Garbage Disposal",
            GeneralLoadSlot::BathroomFans => "Bathroom Fans",
            GeneralLoadSlot::GarageDoorOpener => "Garage Door Opener",
            GeneralLoadSlot::Dryer => "Dryer",
            GeneralLoadSlot::Range => "Range",
            GeneralLoadSlot::Refrigerator => "Refrigerator",
            GeneralLoadSlot::Oven => "Oven",
            GeneralLoadSlot::Cooktop => "Cooktop",
            GeneralLoadSlot::WaterHeater => "Water Heater",
        }
    }
}

/// 一般负荷：15 个固定项、照明用途类型以及自定义项。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GeneralLoads {
    pub lighting: UnitLoad,
    pub small_appliance: UnitLoad,
    pub laundry: UnitLoad,
    pub bathroom: UnitLoad,
    pub dishwasher: UnitLoad,
    pub microwave_oven: UnitLoad,
    pub garbage_disposal: UnitLoad,
    pub bathroom_fans: UnitLoad,
    pub garage_door_opener: UnitLoad,
    pub dryer: UnitLoad,
    pub range: UnitLoad,
    pub refrigerator: UnitLoad,
    pub oven: UnitLoad,
    pub cooktop: UnitLoad,
    pub water_heater: UnitLoad,
    pub lighting_occupancy_type: LightingOccupancyType,
    pub customs: Vec<UnitLoad>,
}

/// 照明负荷按每平方英尺 3VA 估算。
pub const LIGHTING_VA_PER_SQ_FT: i64 = 3;

impl GeneralLoads {
    pub fn slot(&self, slot: GeneralLoadSlot) -> &UnitLoad {
        match slot {
            GeneralLoadSlot::Lighting => &self.lighting,
            GeneralLoadSlot::SmallAppliance => &self.small_appliance,
            GeneralLoadSlot::Laundry => &self.laundry,
            GeneralLoadSlot::Bathroom => &self.bathroom,
            GeneralLoadSlot::Dishwasher => &self.dishwasher,
            GeneralLoadSlot::MicrowaveOven => &self.microwave_oven,
            GeneralLoadSlot::GarbageDisposal => &self.garbage_disposal,
            GeneralLoadSlot::BathroomFans => &self.bathroom_fans,
            GeneralLoadSlot::GarageDoorOpener => &self.garage_door_opener,
            GeneralLoadSlot::Dryer => &self.dryer,
            GeneralLoadSlot::Range => &self.range,
            GeneralLoadSlot::Refrigerator => &self.refrigerator,
            GeneralLoadSlot::Oven => &self.oven,
            GeneralLoadSlot::Cooktop => &self.cooktop,
            GeneralLoadSlot::WaterHeater => &self.water_heater,
        }
    }

    pub fn slot_mut(&mut self, slot: GeneralLoadSlot) -> &mut UnitLoad {
        match slot {
            GeneralLoadSlot::Lighting => &mut self.lighting,
            GeneralLoadSlot::SmallAppliance => &mut self.small_appliance,
            GeneralLoadSlot::Laundry => &mut self.laundry,
            GeneralLoadSlot::Bathroom => &mut self.bathroom,
            GeneralLoadSlot::Dishwasher => &mut self.dishwasher,
            GeneralLoadSlot::MicrowaveOven => &mut self.microwave_oven,
            GeneralLoadSlot::GarbageDisposal => &mut self.garbage_disposal,
            GeneralLoadSlot::BathroomFans => &mut self.bathroom_fans,
            GeneralLoadSlot::GarageDoorOpener => &mut self.garage_door_opener,
            GeneralLoadSlot::Dryer => &mut self.dryer,
            GeneralLoadSlot::Range => &mut self.range,
            GeneralLoadSlot::Refrigerator => &mut self.refrigerator,
            GeneralLoadSlot::Oven => &mut self.oven,
            GeneralLoadSlot::Cooktop => &mut self.cooktop,
            GeneralLoadSlot::WaterHeater => &mut self.water_heater,
        }
    }

    /// 依据面积重设照明负荷（单台，3VA/ft²）。
    pub fn set_lighting_from_floor_area(&mut self, floor_area: i64) {
        self.lighting.va = floor_area * LIGHTING_VA_PER_SQ_FT;
        self.lighting.multiplier = 1;
    }

    /// 所有固定项与自定义项，依次迭代。
    pub fn all_loads(&self) -> impl Iterator<Item = &UnitLoad> + '_ {
        GeneralLoadSlot::ALL
            .iter()
            .map(|slot| self.slot(*slot))
            .chain(self.customs.iter())
    }
}

impl Default for GeneralLoads {
    fn default() -> Self {
        let mut loads = Self {
            lighting: UnitLoad::default(),
            small_appliance: UnitLoad::default(),
            laundry: UnitLoad::default(),
            bathroom: UnitLoad::default(),
            dishwasher: UnitLoad::default(),
            microwave_oven: UnitLoad::default(),
            garbage_disposal: UnitLoad::default(),
            bathroom_fans: UnitLoad::default(),
            garage_door_opener: UnitLoad::default(),
            dryer: UnitLoad::default(),
            range: UnitLoad::default(),
            refrigerator: UnitLoad::default(),
            oven: UnitLoad::default(),
            cooktop: UnitLoad::default(),
            water_heater: UnitLoad::default(),
            lighting_occupancy_type: LightingOccupancyType::default(),
            customs: Vec::new(),
        };
        for slot in GeneralLoadSlot::ALL {
            *loads.slot_mut(slot) = UnitLoad::new(slot.label(), 0, 1);
        }
        loads.small_appliance.va = 1500;
        loads.small_appliance.multiplier = 3;
        loads.laundry.va = 1500;
        loads.bathroom.va = 1500;
        loads
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HeatingUnit {
    pub heating: i64,
    pub number_of_units: i64,
}

impl Default for HeatingUnit {
    fn default() -> Self {
        Self {
            heating: 0,
            number_of_units: 1,
        }
    }
}

/// 空调/采暖负荷，按铭牌 100% 计入。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AcLoads {
    pub condenser: i64,
    pub fan_coil: i64,
    pub heating_unit: HeatingUnit,
    pub electrical_code: String,
}

impl AcLoads {
    pub const DEFAULT_CODE: &'static str = "220.82(C)";

    #[inline]
    pub fn total(&self) -> i64 {
        self.condenser + self.fan_coil + self.heating_unit.heating
    }
}

impl Default for AcLoads {
    fn default() -> Self {
        Self {
            condenser: 0,
            fan_coil: 0,
            heating_unit: HeatingUnit::default(),
            electrical_code: Self::DEFAULT_CODE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ApplianceType {
    Electric,
    Gas,
    #[default]
    #[serde(rename = "NA")]
    NotApplicable,
}

impl fmt::Display for ApplianceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ApplianceType::Electric => "Electric",
            ApplianceType::Gas => "Gas",
            ApplianceType::NotApplicable => "NA",
        };
        f.write_str(text)
    }
}

/// 住宅面积与主要电器类型。面积保留原始输入字符串，在计算前校验。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DwellingArea {
    pub floor_area: String,
    pub heater: ApplianceType,
    pub dryer: ApplianceType,
    pub oven: ApplianceType,
    pub cooktop: ApplianceType,
}

impl Default for DwellingArea {
    fn default() -> Self {
        Self {
            floor_area: "0".to_string(),
            heater: ApplianceType::default(),
            dryer: ApplianceType::default(),
            oven: ApplianceType::default(),
            cooktop: ApplianceType::default(),
        }
    }
}

/// 单个住宅单元的全部输入。汇总值（Totals）不在此存储，由计算层按需推导。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UnitInformation {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default = "UnitInformation::default_voltage")]
    pub voltage: u32,
    #[serde(default)]
    pub dwelling_area: DwellingArea,
    #[serde(default)]
    pub general_loads: GeneralLoads,
    #[serde(rename = "ACLoads", default)]
    pub ac_loads: AcLoads,
    #[serde(default)]
    pub custom_loads: Vec<UnitLoad>,
}

impl UnitInformation {
    pub const SUPPORTED_VOLTAGES: [u32; 2] = [208, 240];

    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            voltage: Self::default_voltage(),
            dwelling_area: DwellingArea::default(),
            general_loads: GeneralLoads::default(),
            ac_loads: AcLoads::default(),
            custom_loads: Vec::new(),
        }
    }

    fn default_voltage() -> u32 {
        240
    }

    /// 形如 `Unit A - ID3` 的显示名，亦是快照目录名的基础。
    pub fn formatted_name(&self) -> String {
        format!("Unit {} - ID{}", self.name, self.id)
    }

    /// 是否存在名称恰为 `name` 的自定义负荷（区分大小写）。
    pub fn has_custom_load(&self, name: &str) -> bool {
        self.custom_loads.iter().any(|load| load.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UnitCounter {
    #[serde(rename = "UnitID")]
    pub unit_id: u32,
    pub count: u32,
}

/// 建筑：由若干单元计数组成。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildingInformation {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub counters: Vec<UnitCounter>,
}

impl BuildingInformation {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            counters: Vec::new(),
        }
    }

    pub fn formatted_name(&self) -> String {
        format!("Building {} - ID{}", self.name, self.id)
    }

    #[inline]
    pub fn total_number_of_units(&self) -> u32 {
        self.counters
            .iter()
            .fold(0, |sum: u32, counter| sum.saturating_add(counter.count))
    }

    /// 设置某单元的数量，为 0 时移除计数器。
    pub fn set_count(&mut self, unit_id: u32, count: u32) {
        if count == 0 {
            self.remove_unit(unit_id);
            return;
        }
        match self
            .counters
            .iter_mut()
            .find(|counter| counter.unit_id == unit_id)
        {
            Some(counter) => counter.count = count,
            None => self.counters.push(UnitCounter { unit_id, count }),
        }
    }

    pub fn count_for(&self, unit_id: u32) -> u32 {
        self.counters
            .iter()
            .filter(|counter| counter.unit_id == unit_id)
            .map(|counter| counter.count)
            .sum()
    }

    /// 移除所有引用该单元的计数器，返回是否有变更。
    pub fn remove_unit(&mut self, unit_id: u32) -> bool {
        let before = self.counters.len();
        self.counters.retain(|counter| counter.unit_id != unit_id);
        before != self.counters.len()
    }
}
