/*!
Sorties adb réalistes, relevées sur de vrais appareils puis anonymisées.
*/

pub const DF_DATA: &str = "Filesystem       Size  Used Avail Use% Mounted on\n\
                           /dev/block/dm-46 107G   41G   66G  39% /data\n";

pub const DF_MALFORMED: &str = "df: /data: Permission denied\n";

pub const PM_THIRD_PARTY: &str = "package:com.whatsapp\n\
                                  package:org.telegram.messenger\n\
                                  package:com.spotify.music\n";

pub const ACCOUNTS_XIAOMI: &str = "Accounts: 2\n\
                                   \x20 Account {name=jane.doe@gmail.com, type=com.google}\n\
                                   \x20 Account {name=1823456789, type=com.xiaomi}\n";

pub const ACCOUNTS_GOOGLE: &str = "  Account {name=amara@example.com, type=com.google}\n";

pub const KERNEL_VERSION: &str = "Linux version 5.10.198-android12-9 (build-user@build-host) #1 SMP PREEMPT";

/// Réponses d'un appareil : commande shell exacte -> sortie
#[derive(Debug, Clone, Default)]
pub struct DeviceScript {
    entries: Vec<(String, String)>,
}

impl DeviceScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute ou remplace la réponse d'une commande
    pub fn with(mut self, command: &str, output: &str) -> Self {
        self.entries.retain(|(cmd, _)| cmd != command);
        self.entries.push((command.to_string(), output.to_string()));
        self
    }

    pub fn prop(self, property: &str, value: &str) -> Self {
        self.with(&format!("getprop {property}"), &format!("{value}\n"))
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(c, o)| (c.as_str(), o.as_str()))
    }

    fn common(self) -> Self {
        self.with("cat /proc/version", KERNEL_VERSION)
            .with("df -h /data", DF_DATA)
            .with("pm list packages -3", PM_THIRD_PARTY)
    }

    /// Redmi Note 12, MIUI, bootloader verrouillé
    pub fn xiaomi() -> Self {
        Self::new()
            .prop("ro.product.brand", "Xiaomi")
            .prop("ro.product.marketname", "Redmi Note 12")
            .prop("ro.product.model", "23021RAAEG")
            .prop("ro.build.version.release", "13")
            .prop("ro.build.version.security_patch", "2024-05-01")
            .prop("gsm.version.baseband", "MPSS.HI.4.3.1-00259-KAMORTA_GEN_PACK-1")
            .prop("ro.secureboot.lockstate", "locked")
            .with("dumpsys account", ACCOUNTS_XIAOMI)
            .common()
    }

    /// HOT 40 Pro, XOS, bootloader déverrouillé (`orange`)
    pub fn infinix() -> Self {
        Self::new()
            .prop("ro.product.brand", "Infinix")
            .prop("persist.trans.sys.trans.device.name", "HOT 40 Pro")
            .prop("ro.build.version.release", "14")
            .prop("ro.build.version.security_patch", "2024-03-05")
            .prop("gsm.version.baseband", "MOLY.LR12A.R3.MP.V84.P14")
            .prop("ro.boot.verifiedbootstate", "orange")
            .with("dumpsys account | grep name", ACCOUNTS_GOOGLE)
            .common()
    }

    /// Marque absente du registry : passe par l'extracteur générique
    pub fn unknown_brand(reported: &str) -> Self {
        Self::new()
            .prop("ro.product.brand", reported)
            .prop("ro.product.model", "Pixel 7")
            .prop("ro.build.version.release", "14")
            .prop("ro.build.version.security_patch", "2024-06-05")
            .prop("gsm.version.baseband", "g5300i-230927-231103-B-11035553")
            .prop("ro.boot.verifiedbootstate", "green")
            .with("dumpsys account", ACCOUNTS_GOOGLE)
            .common()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_replaces_previous_reply() {
        let script = DeviceScript::xiaomi().with("df -h /data", DF_MALFORMED);
        let df: Vec<&str> = script.entries().filter(|(c, _)| *c == "df -h /data").map(|(_, o)| o).collect();
        assert_eq!(df, vec![DF_MALFORMED]);
    }
}
