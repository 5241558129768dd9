//! MAC address tables, in whichever column layout the IOS release prints.
use super::registry::MacTableLayout;
use crate::import::topology::{Mac, PhysicalNode};

pub fn parse(lines: &[String], layout: &MacTableLayout, node: &mut PhysicalNode) -> bool {
    let mut found = false;
    for line in lines {
        let columns: Vec<&str> = line.split_whitespace().collect();
        if columns.len() != layout.columns {
            continue;
        }
        if columns.iter().any(|column| layout.skip_tokens.contains(column)) {
            continue;
        }
        let (Ok(vlan), Ok(mac)) = (columns[layout.vlan].parse::<u16>(), columns[layout.mac].parse::<Mac>()) else {
            log::debug!("Skipping MAC table row: {line}");
            continue;
        };
        node.add_mac_entry(Some(vlan), mac, columns[layout.interface]);
        found = true;
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    const V12: &str = "\
Destination Address  Address Type  VLAN  Destination Port
-------------------  ------------  ----  --------------------
0100.0ccc.cccc          Static         All   CPU
0011.2233.4455          Dynamic       10     FastEthernet0/1
0011.2233.4466          Dynamic       20     FastEthernet0/2
0011.2233.4477          Dynamic       20     FastEthernet0/2
";

    const V15: &str = "\
          Mac Address Table
-------------------------------------------

Vlan    Mac Address       Type        Ports
----    -----------       --------    -----
 All    0100.0ccc.cccc    STATIC      CPU
  10    0011.2233.4455    DYNAMIC     Fa0/1
  20    0011.2233.4466    DYNAMIC     Fa0/2
  20    0011.2233.4477    DYNAMIC     Fa0/2
Total Mac Addresses for this criterion: 3
";

    fn import(text: &str, layout: &MacTableLayout) -> PhysicalNode {
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        let mut node = PhysicalNode::new("sw1");
        assert!(parse(&lines, layout, &mut node));
        node
    }

    #[test]
    fn both_layouts_agree() {
        let v12 = import(V12, &MacTableLayout::V12);
        let v15 = import(V15, &MacTableLayout::V15);

        for node in [&v12, &v15] {
            assert_eq!(node.mac_table().len(), 3);
            assert_eq!(node.vlans().map(|vlan| vlan.id).collect::<Vec<_>>(), vec![10, 20]);
            assert_eq!(node.vlan(20).unwrap().macs.len(), 2);
            assert_eq!(node.port("FastEthernet0/2").unwrap().connections.len(), 2);
            assert!(node.port("FastEthernet0/1").unwrap().vlans.contains(&10));
        }

        let associations = |node: &PhysicalNode| -> Vec<(Option<u16>, Mac)> {
            node.mac_table().iter().map(|entry| (entry.vlan, entry.mac)).collect()
        };
        assert_eq!(associations(&v12), associations(&v15));
    }
}
